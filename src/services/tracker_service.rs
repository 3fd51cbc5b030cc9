// services/tracker_service.rs
use crate::config::TrackerConfig;
use crate::errors::error::TrackingError;
use crate::infrastructure::provider::ProviderTrait;
use crate::models::domain::{TransactionRecord, TransactionState, TxEvent};
use crate::repositories::TransactionStore;
use crate::services::event_bus::EventBus;
use crate::services::notifier::Notifier;
use crate::services::tx::nonce::NonceService;
use crate::{log_debug, log_info, log_warn};
use chrono::Utc;
use ethers_core::types::{TransactionReceipt, U256};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// 轮询本账户的 Pending 交易并推进状态机
pub struct TrackerService {
    gateway: Arc<dyn ProviderTrait>,
    store: Arc<dyn TransactionStore>,
    events: EventBus,
    notifier: Arc<dyn Notifier>,
    nonce: Arc<NonceService>,
    config: TrackerConfig,
    worker: Mutex<Option<Worker>>,
}

fn receipt_outcome(receipt: &TransactionReceipt) -> TransactionState {
    match receipt.status {
        Some(status) if status.is_zero() => TransactionState::Failed,
        Some(_) => TransactionState::Completed,
        None => TransactionState::Error,
    }
}

impl TrackerService {
    pub fn new(
        gateway: Arc<dyn ProviderTrait>,
        store: Arc<dyn TransactionStore>,
        events: EventBus,
        notifier: Arc<dyn Notifier>,
        nonce: Arc<NonceService>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            events,
            notifier,
            nonce,
            config,
            worker: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// 启动轮询循环；已在运行时直接返回
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }
        let (shutdown, mut rx) = watch::channel(false);
        let tracker = Arc::clone(self);
        let period = self.config.poll_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracker.tick().await;
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            log_debug!("tracker 循环退出: {:#x}", tracker.nonce.address());
        });
        log_info!(
            "tracker 已启动: {:#x} 每 {:?} 轮询一次",
            self.nonce.address(),
            period
        );
        *worker = Some(Worker { shutdown, handle });
    }

    /// 停止轮询并等待循环退出，返回后不会再有 tick 触发
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.handle.await {
            log_warn!("tracker 任务异常退出: {}", e);
        }
        log_info!("tracker 已停止: {:#x}", self.nonce.address());
    }

    /// 一轮轮询：处理本账户所有 Pending 记录，然后回收过期终态记录。
    /// 错误只记录日志，下一轮重试。返回发生状态变更的记录数。
    pub async fn tick(&self) -> usize {
        let address = self.nonce.address();
        let pending = match self.store.all_pending().await {
            Ok(records) => records,
            Err(e) => {
                log_warn!("读取 Pending 记录失败: {}", e);
                return 0;
            }
        };

        let mut changed = 0;
        for record in pending.iter().filter(|r| r.from == address) {
            match self.process(record).await {
                Ok(Some(_)) => changed += 1,
                Ok(None) => {}
                Err(e) => log_warn!("跟踪 {:#x} 失败，下一轮重试: {}", record.id, e),
            }
        }

        self.collect_garbage().await;
        changed
    }

    /// 单条记录的状态推进；非 Pending 记录不做任何事
    pub async fn process(
        &self,
        record: &TransactionRecord,
    ) -> Result<Option<TransactionState>, TrackingError> {
        if record.state != TransactionState::Pending {
            return Ok(None);
        }

        let receipt = self
            .gateway
            .get_transaction_receipt(record.id)
            .await
            .map_err(|source| TrackingError::Gateway {
                id: record.id,
                source,
            })?;

        if let Some(receipt) = receipt {
            let outcome = receipt_outcome(&receipt);
            if !self
                .apply(record, TransactionState::Pending, outcome, receipt.gas_used, true)
                .await?
            {
                return Ok(None);
            }
            self.settle_original(record).await?;
            return Ok(Some(outcome));
        }

        // 没有回执：区分"仍在 mempool"与"所有节点都查不到"
        let known = self
            .gateway
            .get_transaction(record.id)
            .await
            .map_err(|source| TrackingError::Gateway {
                id: record.id,
                source,
            })?;
        if known.is_some() {
            return Ok(None);
        }
        if record.age(Utc::now()) <= self.config.drop_grace() {
            log_debug!("{:#x} 暂未传播到节点，等待宽限期", record.id);
            return Ok(None);
        }

        if self.settle_dropped_replacement(record).await? {
            return Ok(Some(TransactionState::Dropped));
        }
        let dropped = self
            .apply(record, TransactionState::Pending, TransactionState::Dropped, None, true)
            .await?;
        Ok(dropped.then_some(TransactionState::Dropped))
    }

    /// 替换交易上链后，加速的原交易记为 Speedup；已取消的原交易保持 Cancelled
    async fn settle_original(&self, replacement: &TransactionRecord) -> Result<(), TrackingError> {
        let Some(old_id) = replacement.replaces else {
            return Ok(());
        };
        let Some(original) = self.store.get(old_id).await? else {
            return Ok(());
        };
        if original.state == TransactionState::SpeedingUp {
            self.apply(
                &original,
                TransactionState::SpeedingUp,
                TransactionState::Speedup,
                None,
                false,
            )
            .await?;
        }
        Ok(())
    }

    /// 替换交易已丢失：以原交易的回执与 mempool 可见性为准。
    /// 返回 false 表示这不是一笔替换交易，由调用方按普通丢失处理。
    async fn settle_dropped_replacement(
        &self,
        replacement: &TransactionRecord,
    ) -> Result<bool, TrackingError> {
        let Some(old_id) = replacement.replaces else {
            return Ok(false);
        };
        let original = match self.store.get(old_id).await? {
            Some(original) if original.state.is_superseded() => original,
            _ => return Ok(false),
        };

        let receipt = self
            .gateway
            .get_transaction_receipt(old_id)
            .await
            .map_err(|source| TrackingError::Gateway { id: old_id, source })?;

        match receipt {
            Some(receipt) => {
                // 原交易抢先上链，结果归原交易，替换记录静默丢弃
                let outcome = receipt_outcome(&receipt);
                self.apply(&original, original.state, outcome, receipt.gas_used, true)
                    .await?;
                self.apply(
                    replacement,
                    TransactionState::Pending,
                    TransactionState::Dropped,
                    None,
                    false,
                )
                .await?;
            }
            None => {
                let live = self
                    .gateway
                    .get_transaction(old_id)
                    .await
                    .map_err(|source| TrackingError::Gateway { id: old_id, source })?
                    .is_some();
                // 原交易仍在 mempool：替换失败对用户不可见，原交易恢复轮询
                self.apply(
                    replacement,
                    TransactionState::Pending,
                    TransactionState::Dropped,
                    None,
                    !live,
                )
                .await?;
                if live {
                    self.revive(&original).await?;
                } else {
                    self.apply(
                        &original,
                        original.state,
                        TransactionState::Dropped,
                        None,
                        false,
                    )
                    .await?;
                }
            }
        }
        Ok(true)
    }

    /// 被顶替的原交易回到 Pending
    async fn revive(&self, original: &TransactionRecord) -> Result<(), TrackingError> {
        if !self.store.restore(original.id, original.state).await? {
            log_debug!("{:#x} 已不是 {:?}，跳过恢复", original.id, original.state);
            return Ok(());
        }
        log_info!(
            "替换交易丢失，原交易仍在 mempool，恢复轮询 → {:#x} | nonce: {}",
            original.id,
            original.nonce
        );
        self.events.emit(TxEvent::StateChanged {
            id: original.id,
            old: original.state,
            new: TransactionState::Pending,
        });
        Ok(())
    }

    /// 比较并更新状态；只有真正写入时才发事件与通知
    async fn apply(
        &self,
        record: &TransactionRecord,
        expected: TransactionState,
        new: TransactionState,
        gas_used: Option<U256>,
        notify: bool,
    ) -> Result<bool, TrackingError> {
        if !self
            .store
            .transition(record.id, expected, new, gas_used)
            .await?
        {
            log_debug!("{:#x} 已不是 {:?}，跳过", record.id, expected);
            return Ok(false);
        }

        log_info!(
            "交易状态变更 → {:#x} | nonce: {} | {:?} -> {:?}",
            record.id,
            record.nonce,
            expected,
            new
        );
        self.events.emit(TxEvent::StateChanged {
            id: record.id,
            old: expected,
            new,
        });
        if notify && new.is_user_visible_outcome() {
            self.notifier.notify(record, new);
        }
        if new == TransactionState::Completed {
            self.events.emit(TxEvent::RefreshRequested {
                address: record.from,
            });
            if let Err(e) = self.nonce.reconcile(&*self.gateway).await {
                log_warn!("交易完成后 nonce 对齐失败: {}", e);
            }
        }
        Ok(true)
    }

    async fn collect_garbage(&self) {
        let before = Utc::now() - self.config.retention();
        let ids = match self.store.collectable_before(before).await {
            Ok(ids) if ids.is_empty() => return,
            Ok(ids) => ids,
            Err(e) => {
                log_warn!("查询可回收记录失败: {}", e);
                return;
            }
        };
        match self.store.delete(&ids).await {
            Ok(n) => log_debug!("回收 {} 条终态交易记录", n),
            Err(e) => log_warn!("回收交易记录失败: {}", e),
        }
    }
}
