use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use crate::config::Config;
use crate::errors::error::AppError;
use crate::infrastructure::provider::{
    Backend, ChainGateway, EthereumProvider, ProviderTrait, RetryAdapter,
};
use crate::repositories::{InMemoryTransactionRepository, TransactionStore};
use crate::services::tx::signer::{LocalSigner, TxSigner};
use crate::services::{EventBus, LogNotifier, Notifier, Session, SessionManager};
use crate::{log_info, log_warn};

/// 应用程序启动与管理结构体（仅后台服务，无HTTP API）
pub struct Application {
    config: Config,
    gateway: Arc<ChainGateway>,
    store: Arc<dyn TransactionStore>,
    events: EventBus,
    notifier: Arc<dyn Notifier>,
    signer: Arc<dyn TxSigner>,
    sessions: Arc<SessionManager>,
}
pub type Result<T> = std::result::Result<T, AppError>;

/// 每个 endpoint 一个 provider，查询调用外包一层重试
pub fn build_gateway(config: &Config) -> Result<ChainGateway> {
    let eth = &config.ethereum;
    let backends = eth
        .endpoints
        .iter()
        .map(|endpoint| {
            let provider = Arc::new(EthereumProvider::new(endpoint, eth.request_timeout())?);
            let retrying = Arc::new(RetryAdapter::new(
                provider,
                eth.max_retries,
                Duration::from_millis(eth.base_delay_millis),
            )) as Arc<dyn ProviderTrait>;
            Ok(Backend::new(retrying, endpoint.role))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ChainGateway::new(backends))
}

impl Application {
    /// 构建应用实例（不发起任何网络请求）
    pub async fn build(config: Config) -> Result<Self> {
        config.validate()?;

        let gateway = Arc::new(build_gateway(&config)?);

        let key = std::env::var(&config.wallet.private_key_env).map_err(|_| {
            AppError::Config(format!(
                "环境变量 {} 未设置，无法加载签名私钥",
                config.wallet.private_key_env
            ))
        })?;
        let signer = LocalSigner::from_private_key(&key, config.ethereum.chain_id)
            .map_err(|e| AppError::Config(e.to_string()))?;
        log_info!("签名账户: {:#x}", signer.address());

        Ok(Self {
            config,
            gateway,
            store: Arc::new(InMemoryTransactionRepository::new()),
            events: EventBus::default(),
            notifier: Arc::new(LogNotifier),
            signer: Arc::new(signer),
            sessions: Arc::new(SessionManager::new()),
        })
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// 启动当前账户会话与事件日志任务，等待 Ctrl+C 后停机
    pub async fn run(self) -> anyhow::Result<()> {
        let session = Session::new(
            self.signer.clone(),
            self.gateway.clone(),
            self.store.clone(),
            self.events.clone(),
            self.notifier.clone(),
            &self.config,
        );
        self.sessions.activate(session).await;

        let mut rx = self.events.subscribe();
        let event_log = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => log_info!("📣 {:?}", event),
                    Err(RecvError::Lagged(n)) => log_warn!("事件订阅落后，丢失 {} 条", n),
                    Err(RecvError::Closed) => {
                        tracing::error!("事件总线已关闭，停止事件日志");
                        break;
                    }
                }
            }
        });

        info!("✔️ Transaction tracker started");

        // 等待 Ctrl+C 退出
        tokio::signal::ctrl_c().await?;
        info!("⚠️  Received shutdown signal, exiting...");
        self.sessions.shutdown().await;
        event_log.abort();
        Ok(())
    }
}
