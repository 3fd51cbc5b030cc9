pub mod gas_service;
pub mod gas_strategy;

pub use gas_service::GasService;
pub use gas_strategy::{GasKind, TxPriority};
