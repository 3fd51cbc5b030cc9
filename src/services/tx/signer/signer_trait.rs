use crate::errors::error::SignError;
use crate::models::domain::{SignedTransaction, UnsignedTransaction};
use async_trait::async_trait;
use ethers_core::types::Address;

/// 持有私钥的外部能力；失败即终止本次提交，不自动重试
#[async_trait]
pub trait TxSigner: Send + Sync {
    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, SignError>;
    fn address(&self) -> Address;
}
