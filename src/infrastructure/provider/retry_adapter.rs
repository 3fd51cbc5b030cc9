use super::ethereum_provider::{BlockTag, ProviderTrait};
use crate::errors::error::AppError;
use crate::log_warn;
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, H256, Transaction, TransactionReceipt, U256};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// 查询类请求的指数退避重试；广播不重试（由网关的多节点并发覆盖）
pub struct RetryAdapter {
    provider: Arc<dyn ProviderTrait>,
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryAdapter {
    pub fn new(provider: Arc<dyn ProviderTrait>, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            provider,
            max_attempts: max_retries.max(1),
            base_delay,
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        // 指数倍数最高限制在 2^10
        let exponent = (attempt - 1).min(10) as u32;
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(1u64 << exponent);
        // 0~10% 随机抖动，避免多个任务同时打到节点
        let jitter = rand::thread_rng().gen_range(0..=(delay_ms / 10 + 1));
        Duration::from_millis(delay_ms + jitter)
    }

    async fn retry_call<T, Fut, F>(&self, method: &'static str, mut f: F) -> Result<T, AppError>
    where
        F: FnMut(Arc<dyn ProviderTrait>) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, AppError>> + Send,
        T: Send,
    {
        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                log_warn!(
                    "{} {} 第 {} 次重试，等待 {:?}",
                    self.provider.name(),
                    method,
                    attempt + 1,
                    delay
                );
                sleep(delay).await;
            }
            match f(self.provider.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    log_warn!(
                        "{} {} 调用失败 (第 {} 次): {}",
                        self.provider.name(),
                        method,
                        attempt + 1,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::Provider(format!("{} not attempted", method))))
    }
}

#[async_trait]
impl ProviderTrait for RetryAdapter {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn get_balance(&self, address: Address, tag: BlockTag) -> Result<U256, AppError> {
        self.retry_call("eth_getBalance", move |p| async move {
            p.get_balance(address, tag).await
        })
        .await
    }

    async fn get_transaction_count(
        &self,
        address: Address,
        tag: BlockTag,
    ) -> Result<U256, AppError> {
        self.retry_call("eth_getTransactionCount", move |p| async move {
            p.get_transaction_count(address, tag).await
        })
        .await
    }

    async fn get_gas_price(&self) -> Result<U256, AppError> {
        self.retry_call("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, AppError> {
        self.retry_call("eth_call", |p| {
            let tx = tx.clone();
            async move { p.call(&tx).await }
        })
        .await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError> {
        self.retry_call("eth_estimateGas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(&tx).await }
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, AppError> {
        self.provider.send_raw_transaction(raw).await
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, AppError> {
        self.retry_call("eth_getTransactionByHash", move |p| async move {
            p.get_transaction(hash).await
        })
        .await
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, AppError> {
        self.retry_call("eth_getTransactionReceipt", move |p| async move {
            p.get_transaction_receipt(hash).await
        })
        .await
    }
}
