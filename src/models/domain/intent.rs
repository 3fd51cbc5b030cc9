use crate::services::tx::gas::gas_strategy::TxPriority;
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// 链原生币精度
pub const NATIVE_DECIMALS: u8 = 18;

/// 资产描述：`contract` 为 None 表示链原生币
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub decimals: u8,
    pub contract: Option<Address>,
}

impl Token {
    pub fn native(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals: NATIVE_DECIMALS,
            contract: None,
        }
    }

    pub fn erc20(symbol: &str, decimals: u8, contract: Address) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            contract: Some(contract),
        }
    }

    pub fn is_native(&self) -> bool {
        self.contract.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferIntent {
    pub token: Token,
    pub to: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApproveIntent {
    /// 被授权的 ERC20 合约
    pub token: Token,
    pub spender: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapIntent {
    /// 兑换合约（proxy）地址
    pub exchange: Address,
    pub source: Token,
    pub dest: Token,
    pub source_amount: U256,
    pub max_dest_amount: U256,
    pub min_conversion_rate: U256,
    /// 兑换结果接收地址，None 表示发起账户本身
    pub recipient: Option<Address>,
    pub referrer: Address,
}

/// 用户意图（UI 层发起的操作）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxIntent {
    Transfer(TransferIntent),
    Approve(ApproveIntent),
    Swap(SwapIntent),
}

/// 提交前需要满足的 allowance 前置条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceRequirement {
    pub token: Token,
    pub spender: Address,
    pub amount: U256,
}

impl TxIntent {
    pub fn kind(&self) -> OperationKind {
        match self {
            TxIntent::Transfer(_) => OperationKind::Transfer,
            TxIntent::Approve(_) => OperationKind::Approve,
            TxIntent::Swap(_) => OperationKind::Swap,
        }
    }

    /// 与记录展示相关的代币
    pub fn display_token(&self) -> &Token {
        match self {
            TxIntent::Transfer(t) => &t.token,
            TxIntent::Approve(a) => &a.token,
            TxIntent::Swap(s) => &s.source,
        }
    }

    /// 只有以 ERC20 作为输入的 swap 需要花费 allowance；
    /// 账户自己发起的 token transfer 不经过 transferFrom，无需授权
    pub fn allowance_requirement(&self) -> Option<AllowanceRequirement> {
        match self {
            TxIntent::Swap(swap) if !swap.source.is_native() => Some(AllowanceRequirement {
                token: swap.source.clone(),
                spender: swap.exchange,
                amount: swap.source_amount,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Transfer,
    Approve,
    Swap,
}

/// 一次提交请求：意图 + gas 参数
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxRequest {
    pub intent: TxIntent,
    pub priority: TxPriority,
    /// 调用方显式指定的 gas limit，跳过估算
    pub gas_limit: Option<U256>,
    /// 调用方显式指定的 gas price，跳过档位计算
    pub gas_price: Option<U256>,
}

impl TxRequest {
    pub fn new(intent: TxIntent) -> Self {
        Self {
            intent,
            priority: TxPriority::Normal,
            gas_limit: None,
            gas_price: None,
        }
    }

    pub fn with_priority(mut self, priority: TxPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }
}
