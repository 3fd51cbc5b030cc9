// services/tx/signer/local_signer.rs

use crate::errors::error::SignError;
use crate::models::domain::{SignedTransaction, UnsignedTransaction};
use crate::services::tx::signer::TxSigner;
use ethers_core::types::Address;
use ethers_signers::{LocalWallet, Signer};
use std::sync::Arc;

#[derive(Clone)]
pub struct LocalSigner {
    wallet: Arc<LocalWallet>,
}

impl LocalSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        Self {
            wallet: Arc::new(wallet),
        }
    }

    /// 从十六进制私钥构造（可带 0x 前缀）
    pub fn from_private_key(key: &str, chain_id: u64) -> Result<Self, SignError> {
        let bytes = hex::decode(key.trim().trim_start_matches("0x"))
            .map_err(|e| SignError::Unavailable(format!("invalid private key: {}", e)))?;
        if bytes.len() != 32 {
            return Err(SignError::Unavailable(format!(
                "invalid private key: expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let wallet = LocalWallet::from_bytes(&bytes)
            .map_err(|e| SignError::Unavailable(format!("invalid private key: {}", e)))?
            .with_chain_id(chain_id);
        Ok(Self::new(wallet))
    }
}

#[async_trait::async_trait]
impl TxSigner for LocalSigner {
    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, SignError> {
        if tx.from() != self.wallet.address() {
            return Err(SignError::Unavailable(format!(
                "signer {:#x} cannot sign for {:#x}",
                self.wallet.address(),
                tx.from()
            )));
        }
        let typed = tx.to_typed();
        let signature = self
            .wallet
            .sign_transaction(&typed)
            .await
            .map_err(|e| SignError::Failed(e.to_string()))?;
        Ok(SignedTransaction::new(typed.rlp_signed(&signature)))
    }

    fn address(&self) -> Address {
        self.wallet.address()
    }
}
