#[allow(clippy::module_inception)]
pub mod config;

pub use config::{
    Config, EndpointConfig, EndpointRole, EthereumConfig, TrackerConfig, TxConfig, WalletConfig,
};
