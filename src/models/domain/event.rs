use crate::models::domain::transaction::TransactionState;
use ethers_core::types::{Address, H256};

/// 对外发布的交易生命周期事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    Submitted {
        id: H256,
    },
    StateChanged {
        id: H256,
        old: TransactionState,
        new: TransactionState,
    },
    Superseded {
        old_id: H256,
        new_id: H256,
    },
    /// 交易完成后余额、代币历史需要强制刷新
    RefreshRequested {
        address: Address,
    },
}
