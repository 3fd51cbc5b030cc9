// services/tx/nonce/nonce_service.rs

use crate::errors::error::AppError;
use crate::infrastructure::provider::{BlockTag, ProviderTrait};
use crate::log_info;
use ethers_core::types::{Address, U256};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

// 每个账户一个实例，由 Session 创建并以 Arc 注入各服务
// let nonce_service = Arc::new(NonceService::new(account.address()));
// nonce_service.reconcile(&*gateway).await?;
pub struct NonceService {
    address: Address,
    /// 下一个允许使用的 nonce；持锁即独占"分配 -> 广播 -> 提交"整个区间
    next_nonce: Arc<Mutex<u64>>,
    /// 无锁读取的镜像值（监控 / UI 展示）
    current: Arc<AtomicU64>,
}

/// 一次提交尝试持有的 nonce 租约。
/// 持有期间其他提交排队等待；只有 `commit` 才推进计数器，直接 drop 等同于未消耗。
pub struct NonceLease {
    guard: OwnedMutexGuard<u64>,
    current: Arc<AtomicU64>,
    nonce: u64,
}

impl NonceLease {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// 广播拿到交易哈希之后调用
    pub fn commit(mut self) -> u64 {
        let next = self.nonce + 1;
        *self.guard = next;
        self.current.store(next, Ordering::SeqCst);
        next
    }
}

impl NonceService {
    pub fn new(address: Address) -> Self {
        Self::with_initial(address, 0)
    }

    pub fn with_initial(address: Address, initial: u64) -> Self {
        Self {
            address,
            next_nonce: Arc::new(Mutex::new(initial)),
            current: Arc::new(AtomicU64::new(initial)),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// 当前缓存的 nonce，不发起网络请求
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// 与链上 pending 计数对齐，只升不降
    pub async fn reconcile(&self, provider: &dyn ProviderTrait) -> Result<u64, AppError> {
        let mut next = self.next_nonce.lock().await;

        let chain_count = provider
            .get_transaction_count(self.address, BlockTag::Pending)
            .await?;
        if chain_count > U256::from(u64::MAX) {
            return Err(AppError::InvalidNumber(format!(
                "pending transaction count {} overflows u64",
                chain_count
            )));
        }
        let chain_count = chain_count.low_u64();

        if chain_count > *next {
            log_info!(
                "nonce 对齐链上 pending 计数: {:#x} {} -> {}",
                self.address,
                *next,
                chain_count
            );
            *next = chain_count;
            self.current.store(chain_count, Ordering::SeqCst);
        }
        Ok(*next)
    }

    /// 取得下一个 nonce 的独占租约（并发提交在此排队）
    pub async fn allocate(&self) -> NonceLease {
        let guard = self.next_nonce.clone().lock_owned().await;
        let nonce = *guard;
        NonceLease {
            guard,
            current: self.current.clone(),
            nonce,
        }
    }
}
