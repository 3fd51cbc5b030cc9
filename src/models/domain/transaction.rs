use crate::errors::error::BuildError;
use crate::models::domain::intent::{OperationKind, TxIntent};
use crate::utils::format::format_amount;
use chrono::{DateTime, Utc};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, H256, TransactionRequest, U256};
use serde::{Deserialize, Serialize};

/// 未签名交易，构造后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    from: Address,
    to: Option<Address>,
    value: U256,
    data: Bytes,
    nonce: u64,
    gas_price: U256,
    gas_limit: U256,
    chain_id: u64,
}

impl UnsignedTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        from: Address,
        to: Option<Address>,
        value: U256,
        data: Bytes,
        nonce: u64,
        gas_price: U256,
        gas_limit: U256,
        chain_id: u64,
    ) -> Result<Self, BuildError> {
        if gas_limit.is_zero() {
            return Err(BuildError::InvalidTransaction("gas limit must be > 0".into()));
        }
        Ok(Self {
            from,
            to,
            value,
            data,
            nonce,
            gas_price,
            gas_limit,
            chain_id,
        })
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn to(&self) -> Option<Address> {
        self.to
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn gas_price(&self) -> U256 {
        self.gas_price
    }

    pub fn gas_limit(&self) -> U256 {
        self.gas_limit
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// 转成 ethers 的 legacy 交易（gasPrice 模型）
    pub fn to_typed(&self) -> TypedTransaction {
        let mut req = TransactionRequest::new()
            .from(self.from)
            .value(self.value)
            .data(self.data.clone())
            .nonce(self.nonce)
            .gas_price(self.gas_price)
            .gas(self.gas_limit)
            .chain_id(self.chain_id);
        if let Some(to) = self.to {
            req = req.to(to);
        }
        TypedTransaction::Legacy(req)
    }
}

/// Signer 产出的原始字节，只用于广播
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction(Bytes);

impl SignedTransaction {
    pub fn new(raw: Bytes) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Bytes {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    Pending,
    Completed,
    Failed,
    Error,
    Cancelled,
    SpeedingUp,
    Speedup,
    Dropped,
}

impl TransactionState {
    /// 链上结果已确定，不再参与轮询
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Completed
                | TransactionState::Failed
                | TransactionState::Error
                | TransactionState::Dropped
                | TransactionState::Speedup
        )
    }

    /// 已被同 nonce 的替换交易取代，结果由替换交易决定
    pub fn is_superseded(&self) -> bool {
        matches!(self, TransactionState::SpeedingUp | TransactionState::Cancelled)
    }

    /// 需要推送给用户的终态
    pub fn is_user_visible_outcome(&self) -> bool {
        matches!(
            self,
            TransactionState::Completed
                | TransactionState::Failed
                | TransactionState::Error
                | TransactionState::Dropped
        )
    }

    /// 可被垃圾回收的状态
    pub fn is_collectable(&self) -> bool {
        self.is_terminal() || *self == TransactionState::Cancelled
    }
}

/// 持久化的交易记录，id 为广播成功后返回的交易哈希
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: H256,
    pub nonce: u64,
    pub from: Address,
    pub to: Option<Address>,
    /// 交易携带的原生币数量（wei）
    pub value: U256,
    /// 展示用金额（按 token_decimals 计）
    pub amount: U256,
    /// 展示用对手方（转账收款人、授权 spender、兑换合约）
    pub counterparty: Option<Address>,
    pub input: Bytes,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub gas_used: Option<U256>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: TransactionState,
    pub kind: OperationKind,
    pub token_symbol: String,
    pub token_decimals: u8,
    /// 当前记录替换掉的旧交易
    pub replaces: Option<H256>,
    /// 取代当前记录的新交易
    pub replaced_by: Option<H256>,
}

impl TransactionRecord {
    pub fn pending(id: H256, tx: &UnsignedTransaction, intent: &TxIntent) -> Self {
        let now = Utc::now();
        let token = intent.display_token();
        let (amount, counterparty) = match intent {
            TxIntent::Transfer(t) => (t.amount, Some(t.to)),
            TxIntent::Approve(a) => (a.amount, Some(a.spender)),
            TxIntent::Swap(s) => (s.source_amount, Some(s.exchange)),
        };
        Self {
            id,
            nonce: tx.nonce(),
            from: tx.from(),
            to: tx.to(),
            value: tx.value(),
            amount,
            counterparty,
            input: tx.data().clone(),
            gas_price: tx.gas_price(),
            gas_limit: tx.gas_limit(),
            gas_used: None,
            created_at: now,
            updated_at: now,
            state: TransactionState::Pending,
            kind: intent.kind(),
            token_symbol: token.symbol.clone(),
            token_decimals: token.decimals,
            replaces: None,
            replaced_by: None,
        }
    }

    /// 同 nonce 的替换记录（加速沿用原交易内容，只更换哈希与 gas）
    pub fn replacement(&self, id: H256, tx: &UnsignedTransaction) -> Self {
        let now = Utc::now();
        Self {
            id,
            nonce: tx.nonce(),
            to: tx.to(),
            value: tx.value(),
            input: tx.data().clone(),
            gas_price: tx.gas_price(),
            gas_limit: tx.gas_limit(),
            gas_used: None,
            created_at: now,
            updated_at: now,
            state: TransactionState::Pending,
            replaces: Some(self.id),
            replaced_by: None,
            ..self.clone()
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }

    /// 用户可读描述，用于通知文案
    pub fn description(&self) -> String {
        let amount = format_amount(self.amount, self.token_decimals);
        let target = self
            .counterparty
            .map(|to| format!("{:#x}", to))
            .unwrap_or_else(|| "contract".to_string());
        match self.kind {
            OperationKind::Transfer => format!("Sent {} {} to {}", amount, self.token_symbol, target),
            OperationKind::Approve => format!("Approved {} for trading", self.token_symbol),
            OperationKind::Swap => format!("Swapped {} {}", amount, self.token_symbol),
        }
    }
}
