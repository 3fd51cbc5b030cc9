pub mod ethereum_provider;
pub mod gateway;
mod retry_adapter;

pub use ethereum_provider::{BlockTag, EthereumProvider, ProviderTrait};
pub use gateway::{Backend, ChainGateway};
pub use retry_adapter::RetryAdapter;
