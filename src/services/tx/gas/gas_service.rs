// services/tx/gas/gas_service.rs

use crate::errors::error::BuildError;
use crate::infrastructure::provider::ProviderTrait;
use crate::services::tx::gas::gas_strategy::{GasKind, INTRINSIC_GAS, TxPriority};
use ethers_core::types::U256;
use ethers_core::types::transaction::eip2718::TypedTransaction;

/// Gas price / gas limit 计算服务（纯整数运算）
#[derive(Clone, Copy, Debug)]
pub struct GasService {
    /// 估算结果的安全余量百分比（20 = +20%）
    margin_percent: u64,
}

impl Default for GasService {
    fn default() -> Self {
        Self::new(20)
    }
}

impl GasService {
    pub fn new(margin_percent: u64) -> Self {
        Self { margin_percent }
    }

    /// 按档位调整节点建议的 gas price
    pub async fn resolve_gas_price(
        &self,
        provider: &dyn ProviderTrait,
        priority: TxPriority,
    ) -> Result<U256, BuildError> {
        let base = provider
            .get_gas_price()
            .await
            .map_err(|e| BuildError::GasPrice(e.to_string()))?;
        Ok(Self::apply_priority(base, priority))
    }

    pub fn apply_priority(base: U256, priority: TxPriority) -> U256 {
        base.saturating_mul(U256::from(priority.gas_price_percent())) / U256::from(100u64)
    }

    /// 估算结果 +margin% + headroom，结果落在 [INTRINSIC_GAS, ceiling] 区间
    pub fn bounded_limit(&self, estimated: U256, kind: GasKind) -> U256 {
        let padded = estimated.saturating_mul(U256::from(100 + self.margin_percent)) / U256::from(100u64)
            + kind.headroom();
        padded.max(U256::from(INTRINSIC_GAS)).min(kind.ceiling())
    }

    /// 调用方显式给出时直接使用；否则估算，估算失败直接返回错误，不静默回退默认值
    pub async fn resolve_gas_limit(
        &self,
        provider: &dyn ProviderTrait,
        tx: &TypedTransaction,
        kind: GasKind,
        explicit: Option<U256>,
    ) -> Result<U256, BuildError> {
        if let Some(limit) = explicit {
            if limit.is_zero() {
                return Err(BuildError::InvalidIntent("explicit gas limit must be > 0".into()));
            }
            return Ok(limit);
        }
        let estimated = provider
            .estimate_gas(tx)
            .await
            .map_err(|e| BuildError::EstimationFailed(e.to_string()))?;
        Ok(self.bounded_limit(estimated, kind))
    }
}
