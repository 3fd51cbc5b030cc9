// services/tx/gas/gas_strategy.rs

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

/// 交易优先级档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl TxPriority {
    /// 相对节点 eth_gasPrice 的百分比（100 = 无调整）
    pub fn gas_price_percent(&self) -> u64 {
        match self {
            TxPriority::Low => 80,
            TxPriority::Normal => 100,
            TxPriority::High => 150,
            TxPriority::Urgent => 300,
        }
    }
}

/// gas limit 决策所需的交易类别（原生币转账与代币转账默认值不同）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasKind {
    NativeTransfer,
    TokenTransfer,
    Approve,
    Swap,
}

impl GasKind {
    /// 每类交易的 gas limit 上限，估算结果不得超过
    pub fn ceiling(&self) -> U256 {
        U256::from(match self {
            GasKind::NativeTransfer => 21_000u64,
            GasKind::TokenTransfer => 60_000,
            GasKind::Approve => 100_000,
            GasKind::Swap => 660_000,
        })
    }

    /// 估算值之外的固定余量
    pub fn headroom(&self) -> U256 {
        U256::from(match self {
            GasKind::Swap => 100_000u64,
            _ => 20_000,
        })
    }
}

/// 以太坊交易的固有 gas 消耗，任何 limit 不得低于此值
pub const INTRINSIC_GAS: u64 = 21_000;
