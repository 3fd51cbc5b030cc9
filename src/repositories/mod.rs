pub mod traits;
pub mod transaction_repository;

pub use traits::TransactionStore;
pub use transaction_repository::InMemoryTransactionRepository;
