use super::ethereum_provider::{BlockTag, ProviderTrait};
use crate::config::EndpointRole;
use crate::errors::error::{AppError, BroadcastError};
use crate::models::domain::SignedTransaction;
use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, H256, Transaction, TransactionReceipt, U256};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use std::future::Future;
use std::sync::Arc;

pub struct Backend {
    pub provider: Arc<dyn ProviderTrait>,
    pub role: EndpointRole,
}

impl Backend {
    pub fn new(provider: Arc<dyn ProviderTrait>, role: EndpointRole) -> Self {
        Self { provider, role }
    }
}

/// 多节点网关：查询按 primary -> fallback 顺序降级，广播向所有节点并发扇出
pub struct ChainGateway {
    backends: Vec<Backend>,
}

impl ChainGateway {
    pub fn new(mut backends: Vec<Backend>) -> Self {
        // primary 排在最前，broadcast 专用节点排最后
        backends.sort_by_key(|b| match b.role {
            EndpointRole::Primary => 0,
            EndpointRole::Fallback => 1,
            EndpointRole::Broadcast => 2,
        });
        log_info!("ChainGateway 初始化完成: {} 个节点", backends.len());
        Self { backends }
    }

    fn query_backends(&self) -> impl Iterator<Item = &Arc<dyn ProviderTrait>> {
        self.backends
            .iter()
            .filter(|b| b.role.serves_queries())
            .map(|b| &b.provider)
    }

    /// 依次尝试查询节点，返回第一个成功结果
    async fn first_ok<T, F, Fut>(&self, method: &'static str, f: F) -> Result<T, AppError>
    where
        F: Fn(Arc<dyn ProviderTrait>) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut last_error = None;
        for provider in self.query_backends() {
            match f(provider.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log_warn!("{} 在 {} 上失败，切换下一个节点: {}", method, provider.name(), e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::Provider(format!("no query backend for {}", method))))
    }

    /// 依次尝试查询节点，直到某个节点返回 Some；
    /// 只要有节点成功应答 None 且没有节点返回 Some，就视为"所有节点都查不到"
    async fn first_some<T, F, Fut>(&self, method: &'static str, f: F) -> Result<Option<T>, AppError>
    where
        F: Fn(Arc<dyn ProviderTrait>) -> Fut,
        Fut: Future<Output = Result<Option<T>, AppError>>,
    {
        let mut answered = false;
        let mut last_error = None;
        for provider in self.query_backends() {
            match f(provider.clone()).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => answered = true,
                Err(e) => {
                    log_warn!("{} 在 {} 上失败: {}", method, provider.name(), e);
                    last_error = Some(e);
                }
            }
        }
        match (answered, last_error) {
            (true, _) => Ok(None),
            (false, Some(e)) => Err(e),
            (false, None) => Err(AppError::Provider(format!("no query backend for {}", method))),
        }
    }

    /// 冗余广播：同一份签名字节并发发往所有节点，第一个返回哈希的节点胜出。
    /// 其余请求继续在后台执行（有助于 mempool 传播），结果只记录不上报。
    pub async fn broadcast(&self, signed: &SignedTransaction) -> Result<H256, BroadcastError> {
        if self.backends.is_empty() {
            return Err(BroadcastError::NoBackends);
        }
        let attempts = self.backends.len();
        let mut in_flight: FuturesUnordered<_> = self
            .backends
            .iter()
            .map(|backend| {
                let provider = backend.provider.clone();
                let name = provider.name().to_string();
                let raw = signed.raw().clone();
                let handle = tokio::spawn(async move { provider.send_raw_transaction(raw).await });
                async move { (name, handle.await) }
            })
            .collect();

        let mut last_error = String::new();
        while let Some((name, joined)) = in_flight.next().await {
            match joined {
                Ok(Ok(hash)) => {
                    log_info!("广播成功 → {} 返回 hash {:#x}", name, hash);
                    if !in_flight.is_empty() {
                        tokio::spawn(drain_losers(in_flight, hash));
                    }
                    return Ok(hash);
                }
                Ok(Err(e)) => {
                    log_warn!("广播失败 → {}: {}", name, e);
                    last_error = format!("{}: {}", name, e);
                }
                Err(e) => {
                    log_warn!("广播任务异常 → {}: {}", name, e);
                    last_error = format!("{}: {}", name, e);
                }
            }
        }
        Err(BroadcastError::AllBackendsFailed {
            attempts,
            last: last_error,
        })
    }
}

/// 胜出后剩余的广播结果只做日志
async fn drain_losers<S, E>(mut in_flight: S, winner: H256)
where
    S: futures_util::Stream<Item = (String, Result<Result<H256, AppError>, E>)> + Unpin,
    E: std::fmt::Display,
{
    while let Some((name, joined)) = in_flight.next().await {
        match joined {
            Ok(Ok(hash)) if hash == winner => log_debug!("{} 同样接受了 {:#x}", name, hash),
            Ok(Ok(hash)) => log_warn!("{} 返回了不同的 hash {:#x}（胜出 {:#x}）", name, hash, winner),
            Ok(Err(e)) => log_debug!("{} 广播结果已丢弃: {}", name, e),
            Err(e) => log_debug!("{} 广播任务结果已丢弃: {}", name, e),
        }
    }
}

#[async_trait]
impl ProviderTrait for ChainGateway {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn get_balance(&self, address: Address, tag: BlockTag) -> Result<U256, AppError> {
        self.first_ok("eth_getBalance", |p| async move {
            p.get_balance(address, tag).await
        })
        .await
    }

    async fn get_transaction_count(
        &self,
        address: Address,
        tag: BlockTag,
    ) -> Result<U256, AppError> {
        self.first_ok("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(address, tag).await
        })
        .await
    }

    async fn get_gas_price(&self) -> Result<U256, AppError> {
        self.first_ok("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, AppError> {
        self.first_ok("eth_call", |p| async move { p.call(tx).await })
            .await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError> {
        self.first_ok("eth_estimateGas", |p| async move { p.estimate_gas(tx).await })
            .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, AppError> {
        self.broadcast(&SignedTransaction::new(raw))
            .await
            .map_err(|e| AppError::Provider(e.to_string()))
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, AppError> {
        self.first_some("eth_getTransactionByHash", |p| async move {
            p.get_transaction(hash).await
        })
        .await
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, AppError> {
        self.first_some("eth_getTransactionReceipt", |p| async move {
            p.get_transaction_receipt(hash).await
        })
        .await
    }
}
