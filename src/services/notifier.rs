use crate::log_info;
use crate::models::domain::{TransactionRecord, TransactionState};

/// 本地用户通知（推送 / 横幅）的外部边界
pub trait Notifier: Send + Sync {
    fn notify(&self, record: &TransactionRecord, state: TransactionState);
}

/// 默认实现：写日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, record: &TransactionRecord, state: TransactionState) {
        log_info!("🔔 [{:?}] {} ({:#x})", state, record.description(), record.id);
    }
}
