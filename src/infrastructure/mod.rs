pub mod abi;
pub mod provider;
