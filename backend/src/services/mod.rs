//! Monitoring services for the Farm Operations backend

pub mod conditions;
pub mod dedup;
pub mod engine;
pub mod lifecycle;
pub mod notification;
pub mod session;

pub use conditions::{ConditionMonitor, ConditionSettings, ScanReport};
pub use dedup::DedupStore;
pub use engine::{EngineStatus, MonitoringEngine, TickReport};
pub use lifecycle::{CropLifecycleMonitor, LifecycleReport};
pub use notification::{LineNotifier, NotificationSink, SystemNotification, SystemNotifier};
pub use session::MonitorSession;
