pub mod builder;
pub mod gas;
pub mod nonce;
pub mod signer;
