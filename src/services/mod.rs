pub mod broadcast_service;
pub mod event_bus;
pub mod notifier;
pub mod session;
pub mod tracker_service;
pub mod tx;

pub use broadcast_service::BroadcastService;
pub use event_bus::EventBus;
pub use notifier::{LogNotifier, Notifier};
pub use session::{Session, SessionManager};
pub use tracker_service::TrackerService;
