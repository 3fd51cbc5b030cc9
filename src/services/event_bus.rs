use crate::log_trace;
use crate::models::domain::TxEvent;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// 类型化事件通道：每个订阅者独立接收全部生命周期事件
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TxEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TxEvent> {
        self.sender.subscribe()
    }

    /// 没有订阅者时事件直接丢弃
    pub fn emit(&self, event: TxEvent) {
        log_trace!("emit {:?}", event);
        let _ = self.sender.send(event);
    }
}
