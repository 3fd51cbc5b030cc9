pub mod event;
pub mod intent;
pub mod transaction;

pub use event::TxEvent;
pub use intent::{
    AllowanceRequirement, ApproveIntent, NATIVE_DECIMALS, OperationKind, SwapIntent, Token,
    TransferIntent, TxIntent, TxRequest,
};
pub use transaction::{SignedTransaction, TransactionRecord, TransactionState, UnsignedTransaction};
