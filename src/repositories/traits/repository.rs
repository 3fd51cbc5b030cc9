use crate::errors::error::AppError;
use crate::models::domain::{TransactionRecord, TransactionState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers_core::types::{Address, H256, U256};

/// 交易记录的持久化边界。实现只需保证"最新写入单调可见"。
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// 新增记录；同一 (from, nonce) 已存在 Pending 记录时返回 Conflict
    async fn add(&self, record: TransactionRecord) -> Result<(), AppError>;

    /// 无条件更新状态
    async fn update(&self, id: H256, state: TransactionState) -> Result<(), AppError>;

    /// 比较并更新：仅当当前状态等于 `expected` 时写入，返回是否生效
    async fn transition(
        &self,
        id: H256,
        expected: TransactionState,
        new: TransactionState,
        gas_used: Option<U256>,
    ) -> Result<bool, AppError>;

    /// 原子替换：旧记录必须仍为 Pending，置为 `superseded_state` 并写入新记录；
    /// 旧记录已离开 Pending 时返回 Conflict，不写入任何内容
    async fn replace(
        &self,
        old_id: H256,
        superseded_state: TransactionState,
        replacement: TransactionRecord,
    ) -> Result<(), AppError>;

    /// 替换失败后恢复被顶替的记录：仅当当前状态等于 `expected` 时回到 Pending，
    /// 并清除 `replaced_by`。返回是否生效
    async fn restore(&self, id: H256, expected: TransactionState) -> Result<bool, AppError>;

    async fn delete(&self, ids: &[H256]) -> Result<usize, AppError>;

    async fn get(&self, id: H256) -> Result<Option<TransactionRecord>, AppError>;

    async fn all_pending(&self) -> Result<Vec<TransactionRecord>, AppError>;

    async fn pending_at_nonce(
        &self,
        from: Address,
        nonce: u64,
    ) -> Result<Vec<TransactionRecord>, AppError>;

    /// 最后更新时间早于 `before` 的可回收记录 id
    async fn collectable_before(&self, before: DateTime<Utc>) -> Result<Vec<H256>, AppError>;
}
