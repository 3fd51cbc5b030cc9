use crate::errors::error::AppError;
use crate::models::domain::{TransactionRecord, TransactionState};
use crate::repositories::traits::repository::TransactionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers_core::types::{Address, H256, U256};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 内存实现：单把读写锁，所有写操作天然原子
#[derive(Default)]
pub struct InMemoryTransactionRepository {
    records: RwLock<HashMap<H256, TransactionRecord>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn has_pending_at(
        records: &HashMap<H256, TransactionRecord>,
        from: Address,
        nonce: u64,
        except: Option<H256>,
    ) -> bool {
        records.values().any(|r| {
            r.state == TransactionState::Pending
                && r.from == from
                && r.nonce == nonce
                && Some(r.id) != except
        })
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionRepository {
    async fn add(&self, record: TransactionRecord) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(AppError::Conflict(format!("record {:#x} already exists", record.id)));
        }
        if record.state == TransactionState::Pending
            && Self::has_pending_at(&records, record.from, record.nonce, None)
        {
            return Err(AppError::Conflict(format!(
                "a pending record already exists for {:#x} nonce {}",
                record.from, record.nonce
            )));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, id: H256, state: TransactionState) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("record {:#x}", id)))?;
        record.state = state;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn transition(
        &self,
        id: H256,
        expected: TransactionState,
        new: TransactionState,
        gas_used: Option<U256>,
    ) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("record {:#x}", id)))?;
        if record.state != expected {
            return Ok(false);
        }
        record.state = new;
        if gas_used.is_some() {
            record.gas_used = gas_used;
        }
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn replace(
        &self,
        old_id: H256,
        superseded_state: TransactionState,
        replacement: TransactionRecord,
    ) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        if records.contains_key(&replacement.id) {
            return Err(AppError::Conflict(format!(
                "record {:#x} already exists",
                replacement.id
            )));
        }
        match records.get(&old_id) {
            None => return Err(AppError::NotFound(format!("record {:#x}", old_id))),
            Some(old) if old.state != TransactionState::Pending => {
                return Err(AppError::Conflict(format!(
                    "record {:#x} is {:?}, not pending",
                    old_id, old.state
                )));
            }
            Some(_) => {}
        }
        if Self::has_pending_at(&records, replacement.from, replacement.nonce, Some(old_id)) {
            return Err(AppError::Conflict(format!(
                "a pending record already exists for {:#x} nonce {}",
                replacement.from, replacement.nonce
            )));
        }
        if let Some(old) = records.get_mut(&old_id) {
            old.state = superseded_state;
            old.replaced_by = Some(replacement.id);
            old.updated_at = Utc::now();
        }
        records.insert(replacement.id, replacement);
        Ok(())
    }

    async fn restore(&self, id: H256, expected: TransactionState) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        let (from, nonce) = match records.get(&id) {
            None => return Err(AppError::NotFound(format!("record {:#x}", id))),
            Some(r) if r.state != expected => return Ok(false),
            Some(r) => (r.from, r.nonce),
        };
        if Self::has_pending_at(&records, from, nonce, Some(id)) {
            return Err(AppError::Conflict(format!(
                "a pending record already exists for {:#x} nonce {}",
                from, nonce
            )));
        }
        if let Some(record) = records.get_mut(&id) {
            record.state = TransactionState::Pending;
            record.replaced_by = None;
            record.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn delete(&self, ids: &[H256]) -> Result<usize, AppError> {
        let mut records = self.records.write().await;
        Ok(ids.iter().filter(|id| records.remove(*id).is_some()).count())
    }

    async fn get(&self, id: H256) -> Result<Option<TransactionRecord>, AppError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn all_pending(&self) -> Result<Vec<TransactionRecord>, AppError> {
        let records = self.records.read().await;
        let mut pending: Vec<_> = records
            .values()
            .filter(|r| r.state == TransactionState::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.from, r.nonce, r.created_at));
        Ok(pending)
    }

    async fn pending_at_nonce(
        &self,
        from: Address,
        nonce: u64,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.state == TransactionState::Pending && r.from == from && r.nonce == nonce)
            .cloned()
            .collect())
    }

    async fn collectable_before(&self, before: DateTime<Utc>) -> Result<Vec<H256>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.state.is_collectable() && r.updated_at < before)
            .map(|r| r.id)
            .collect())
    }
}
