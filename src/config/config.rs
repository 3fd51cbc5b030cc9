use crate::errors::error::AppError;
use crate::services::tx::gas::gas_strategy::TxPriority;
use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub ethereum: EthereumConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub tx: TxConfig,
    pub wallet: WalletConfig,
}

/// 节点角色：primary/fallback 参与查询与广播，broadcast 仅用于冗余广播
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    Primary,
    Fallback,
    Broadcast,
}

impl EndpointRole {
    pub fn serves_queries(&self) -> bool {
        !matches!(self, EndpointRole::Broadcast)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    pub role: EndpointRole,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EthereumConfig {
    pub chain_id: u64,
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_base_delay_millis")]
    pub base_delay_millis: u64,
}

impl EthereumConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// pending 交易轮询间隔
    pub poll_interval_secs: u64,
    /// 广播后多长时间仍查不到交易才判定为 Dropped
    pub drop_grace_secs: u64,
    /// 终态记录保留时长，超过后被清理
    pub retention_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            drop_grace_secs: 60,
            retention_secs: 7 * 24 * 3600,
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn drop_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.drop_grace_secs as i64)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs as i64)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TxConfig {
    pub default_priority: TxPriority,
    /// 加速/取消时新 gas price 至少比旧值高出的百分比
    pub speedup_min_bump_percent: u64,
    /// allowance 非零但不足时先归零再授权（部分 ERC20 合约要求）
    pub reset_stale_allowance: bool,
    pub gas_limit_margin_percent: u64,
    /// 链原生币符号，用于取消交易等无 token 的记录展示
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            default_priority: TxPriority::Normal,
            speedup_min_bump_percent: 10,
            reset_stale_allowance: true,
            gas_limit_margin_percent: 20,
            native_symbol: default_native_symbol(),
        }
    }
}

fn default_native_symbol() -> String {
    "ETH".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    /// 存放私钥的环境变量名
    pub private_key_env: String,
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_max_retries() -> usize {
    3
}

fn default_base_delay_millis() -> u64 {
    500
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 启动前校验，避免带着错误配置进入运行期
    pub fn validate(&self) -> Result<(), AppError> {
        if !self
            .ethereum
            .endpoints
            .iter()
            .any(|e| e.role == EndpointRole::Primary)
        {
            return Err(AppError::Config("at least one primary endpoint is required".into()));
        }
        for endpoint in &self.ethereum.endpoints {
            Url::parse(&endpoint.url).map_err(|e| {
                AppError::Config(format!("endpoint {} has invalid url: {}", endpoint.name, e))
            })?;
        }
        if self.tracker.poll_interval_secs == 0 {
            return Err(AppError::Config("tracker.poll_interval_secs must be > 0".into()));
        }
        if self.ethereum.request_timeout_secs == 0 {
            return Err(AppError::Config("ethereum.request_timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}
