use crate::config::EndpointConfig;
use crate::errors::error::AppError;
use crate::log_info;
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{
    Address, BlockId, BlockNumber, Bytes, H256, Transaction, TransactionReceipt, U256,
};
use ethers_providers::{Http, Middleware, Provider, ProviderError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// `eth_getTransactionCount` / `eth_getBalance` 的区块标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
}

impl From<BlockTag> for BlockId {
    fn from(tag: BlockTag) -> Self {
        match tag {
            BlockTag::Latest => BlockId::Number(BlockNumber::Latest),
            BlockTag::Pending => BlockId::Number(BlockNumber::Pending),
        }
    }
}

/// 链上 JSON-RPC 能力抽象（单节点、重试包装、多节点网关共用）
#[async_trait]
pub trait ProviderTrait: Send + Sync {
    fn name(&self) -> &str {
        "provider"
    }
    async fn get_balance(&self, address: Address, tag: BlockTag) -> Result<U256, AppError>;
    async fn get_transaction_count(&self, address: Address, tag: BlockTag)
    -> Result<U256, AppError>;
    async fn get_gas_price(&self) -> Result<U256, AppError>;
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, AppError>;
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError>;
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, AppError>;
    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, AppError>;
    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, AppError>;
}

/// 单个 RPC 节点，所有请求带显式超时
pub struct EthereumProvider {
    name: String,
    provider: Arc<Provider<Http>>,
    request_timeout: Duration,
}

impl EthereumProvider {
    pub fn new(endpoint: &EndpointConfig, request_timeout: Duration) -> Result<Self, AppError> {
        let provider = Provider::<Http>::try_from(endpoint.url.as_str()).map_err(|e| {
            AppError::Config(format!("invalid RPC url for {}: {}", endpoint.name, e))
        })?;
        log_info!(
            "初始化 RPC Provider: {} ({:?}), 超时 {:?}",
            endpoint.name,
            endpoint.role,
            request_timeout
        );
        Ok(Self {
            name: endpoint.name.clone(),
            provider: Arc::new(provider),
            request_timeout,
        })
    }

    async fn timed<T, F>(&self, method: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, ProviderError>> + Send,
    {
        match timeout(self.request_timeout, fut).await {
            Ok(result) => result.map_err(|e| AppError::Provider(format!("{} {}: {}", self.name, method, e))),
            Err(_) => Err(AppError::Timeout {
                method,
                timeout_secs: self.request_timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl ProviderTrait for EthereumProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_balance(&self, address: Address, tag: BlockTag) -> Result<U256, AppError> {
        self.timed("eth_getBalance", self.provider.get_balance(address, Some(tag.into())))
            .await
    }

    async fn get_transaction_count(
        &self,
        address: Address,
        tag: BlockTag,
    ) -> Result<U256, AppError> {
        self.timed(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(address, Some(tag.into())),
        )
        .await
    }

    async fn get_gas_price(&self) -> Result<U256, AppError> {
        self.timed("eth_gasPrice", self.provider.get_gas_price()).await
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, AppError> {
        self.timed("eth_call", self.provider.call(tx, None)).await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError> {
        self.timed("eth_estimateGas", self.provider.estimate_gas(tx, None))
            .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, AppError> {
        // 只取回交易哈希，不等待确认；确认由 tracker 轮询完成
        let provider = self.provider.clone();
        self.timed("eth_sendRawTransaction", async move {
            provider
                .send_raw_transaction(raw)
                .await
                .map(|pending| pending.tx_hash())
        })
        .await
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, AppError> {
        self.timed("eth_getTransactionByHash", self.provider.get_transaction(hash))
            .await
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, AppError> {
        self.timed(
            "eth_getTransactionReceipt",
            self.provider.get_transaction_receipt(hash),
        )
        .await
    }
}
