use ethers_core::types::{H256, U256};
use ethers_providers::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("RPC provider 错误: {0}")]
    Provider(String),

    #[error("RPC 请求超时: {method} ({timeout_secs}s)")]
    Timeout { method: &'static str, timeout_secs: u64 },

    #[error("无效的数字: {0}")]
    InvalidNumber(String),

    /// 存储层错误（读写失败）
    #[error("存储错误: {0}")]
    Store(String),

    /// 资源未找到
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 业务逻辑冲突（重复插入、状态异常）
    #[error("业务冲突错误: {0}")]
    Conflict(String),

    /// 内部不可预期错误（兜底）
    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::Provider(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// 构建交易失败（可由用户调整参数后重试）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    #[error("gas estimation failed: {0}")]
    EstimationFailed(String),

    #[error("gas price query failed: {0}")]
    GasPrice(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
}

/// 签名失败：本次尝试终止，不消耗 nonce，不自动重试
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    #[error("signing cancelled by user")]
    Cancelled,

    #[error("signing failed: {0}")]
    Failed(String),
}

/// 所有冗余节点均广播失败（payload 不变即可安全重试）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("no broadcast backend configured")]
    NoBackends,

    #[error("broadcast failed on all {attempts} backends, last error: {last}")]
    AllBackendsFailed { attempts: usize, last: String },
}

/// 轮询期间的瞬时错误，只记录日志，下一轮重试
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("gateway error while tracking {id:#x}: {source}")]
    Gateway {
        id: H256,
        #[source]
        source: AppError,
    },

    #[error("store error while tracking: {0}")]
    Store(#[from] AppError),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error("nonce reconciliation failed: {0}")]
    NonceSync(AppError),

    #[error("allowance query failed: {0}")]
    Allowance(AppError),

    #[error("transaction store error: {0}")]
    Store(AppError),

    /// 已广播上链但记录写入失败，调用方凭 `id` 仍可跟踪
    #[error("transaction {id:#x} was broadcast but could not be recorded: {source}")]
    Unrecorded {
        id: H256,
        #[source]
        source: AppError,
    },

    #[error("an identical submission is already in flight")]
    AlreadyInFlight,

    #[error("transaction {0:#x} is not pending")]
    NotPending(H256),

    #[error("replacement gas price {offered} is below the required minimum {minimum}")]
    Underpriced { offered: U256, minimum: U256 },
}
