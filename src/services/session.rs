// services/session.rs
use crate::config::Config;
use crate::infrastructure::provider::{ChainGateway, ProviderTrait};
use crate::repositories::TransactionStore;
use crate::services::broadcast_service::BroadcastService;
use crate::services::event_bus::EventBus;
use crate::services::notifier::Notifier;
use crate::services::tracker_service::TrackerService;
use crate::services::tx::builder::TransactionBuilder;
use crate::services::tx::gas::GasService;
use crate::services::tx::nonce::NonceService;
use crate::services::tx::signer::TxSigner;
use crate::{log_info, log_warn};
use arc_swap::ArcSwapOption;
use ethers_core::types::Address;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 一个账户的完整交易生命周期：nonce、广播、跟踪
pub struct Session {
    address: Address,
    nonce: Arc<NonceService>,
    broadcast: Arc<BroadcastService>,
    tracker: Arc<TrackerService>,
}

impl Session {
    pub fn new(
        signer: Arc<dyn TxSigner>,
        gateway: Arc<ChainGateway>,
        store: Arc<dyn TransactionStore>,
        events: EventBus,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        let address = signer.address();
        let nonce = Arc::new(NonceService::new(address));
        let builder = TransactionBuilder::new(
            config.ethereum.chain_id,
            GasService::new(config.tx.gas_limit_margin_percent),
        );
        let broadcast = Arc::new(BroadcastService::new(
            signer,
            nonce.clone(),
            builder,
            gateway.clone(),
            store.clone(),
            events.clone(),
            config.tx.clone(),
        ));
        let tracker = Arc::new(TrackerService::new(
            gateway as Arc<dyn ProviderTrait>,
            store,
            events,
            notifier,
            nonce.clone(),
            config.tracker.clone(),
        ));
        Self {
            address,
            nonce,
            broadcast,
            tracker,
        }
    }

    /// 对齐 nonce 并启动 tracker；对齐失败不阻塞启动，首次提交时会再次尝试
    pub async fn start(&self) {
        if let Err(e) = self.broadcast.ensure_reconciled().await {
            log_warn!("会话启动时 nonce 对齐失败 {:#x}: {}", self.address, e);
        }
        self.tracker.start().await;
        log_info!(
            "会话已启动: {:#x} (nonce {})",
            self.address,
            self.nonce.current()
        );
    }

    pub async fn stop(&self) {
        self.tracker.stop().await;
        log_info!("会话已停止: {:#x}", self.address);
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn current_nonce(&self) -> u64 {
        self.nonce.current()
    }

    pub fn broadcast(&self) -> &Arc<BroadcastService> {
        &self.broadcast
    }

    pub fn tracker(&self) -> &Arc<TrackerService> {
        &self.tracker
    }
}

/// 持有当前活跃会话，切换账户时先停旧会话再启动新会话
#[derive(Default)]
pub struct SessionManager {
    current: ArcSwapOption<Session>,
    switching: Mutex<()>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.load_full()
    }

    pub async fn activate(&self, session: Session) -> Arc<Session> {
        let _switching = self.switching.lock().await;
        let next = Arc::new(session);
        if let Some(previous) = self.current.swap(None) {
            log_info!(
                "切换账户: {:#x} -> {:#x}",
                previous.address(),
                next.address()
            );
            previous.stop().await;
        }
        next.start().await;
        self.current.store(Some(next.clone()));
        next
    }

    pub async fn shutdown(&self) {
        let _switching = self.switching.lock().await;
        if let Some(previous) = self.current.swap(None) {
            previous.stop().await;
        }
    }
}
