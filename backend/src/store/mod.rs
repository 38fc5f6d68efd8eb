//! Store interfaces consumed by the monitoring engine
//!
//! The engine never talks to a database directly. It reads crops, inventory,
//! tasks, farms and the ledger through these traits and writes alerts through
//! [`NotificationStore`]. Two back-ends are provided:
//!
//! - [`MemoryStore`]: everything in process, change feeds pushed over broadcast channels
//! - [`PgStore`]: PostgreSQL via sqlx, change feeds produced by polling

pub mod memory;
pub mod postgres;
pub mod subscription;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared::{
    AlertEvent, CropRecord, CropStatus, Farm, FarmTask, InventoryItem, LedgerEntry, ReminderFlags,
};

use crate::error::AppResult;

pub use memory::{Collection, MemoryStore};
pub use postgres::PgStore;
pub use subscription::{ChangeEvent, ChangeFilter, Subscription, Tracked};

#[async_trait]
pub trait CropStore: Send + Sync {
    async fn list_crops(&self) -> AppResult<Vec<CropRecord>>;

    async fn get_crop(&self, id: Uuid) -> AppResult<Option<CropRecord>>;

    /// Move a crop forward. Backward moves fail with `InvalidStateTransition`.
    async fn update_status(
        &self,
        id: Uuid,
        status: CropStatus,
        harvest_date: Option<NaiveDate>,
    ) -> AppResult<()>;

    async fn set_reminders(&self, id: Uuid, reminders: ReminderFlags) -> AppResult<()>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn list_items(&self) -> AppResult<Vec<InventoryItem>>;

    async fn subscribe_items(&self, filter: ChangeFilter) -> AppResult<Subscription<InventoryItem>>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_tasks(&self) -> AppResult<Vec<FarmTask>>;

    async fn subscribe_tasks(&self, filter: ChangeFilter) -> AppResult<Subscription<FarmTask>>;
}

#[async_trait]
pub trait FarmStore: Send + Sync {
    async fn list_farms(&self) -> AppResult<Vec<Farm>>;

    async fn subscribe_farms(&self, filter: ChangeFilter) -> AppResult<Subscription<Farm>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Entries dated in `[start, end)`
    async fn list_entries_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<LedgerEntry>>;
}

/// Query over persisted alerts
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertQuery {
    /// Only alerts visible to this user (targeted to them or to everybody)
    pub user_id: Option<Uuid>,
    pub unread_only: bool,
    pub limit: usize,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_alert(&self, event: &AlertEvent) -> AppResult<()>;

    async fn get_alert(&self, id: Uuid) -> AppResult<Option<AlertEvent>>;

    /// Returns false when no alert has this id
    async fn mark_read(&self, id: Uuid) -> AppResult<bool>;

    /// Marks unread alerts targeted to the user or to everybody; returns the count
    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64>;

    /// Newest first
    async fn list_alerts(&self, query: AlertQuery) -> AppResult<Vec<AlertEvent>>;

    async fn unread_count(&self, user_id: Uuid) -> AppResult<u64>;
}

/// Every store the engine and the HTTP layer use
#[derive(Clone)]
pub struct Stores {
    pub crops: Arc<dyn CropStore>,
    pub inventory: Arc<dyn InventoryStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub farms: Arc<dyn FarmStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl Stores {
    /// All collections backed by one in-memory store
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            crops: store.clone(),
            inventory: store.clone(),
            tasks: store.clone(),
            farms: store.clone(),
            ledger: store.clone(),
            notifications: store,
        }
    }

    /// All collections backed by PostgreSQL
    pub fn postgres(store: Arc<PgStore>) -> Self {
        Self {
            crops: store.clone(),
            inventory: store.clone(),
            tasks: store.clone(),
            farms: store.clone(),
            ledger: store.clone(),
            notifications: store,
        }
    }
}

/// Statuses from which `next` may be reached
pub(crate) fn predecessors_of(next: CropStatus) -> Vec<CropStatus> {
    [
        CropStatus::Planted,
        CropStatus::Growing,
        CropStatus::Harvested,
        CropStatus::Failed,
    ]
    .into_iter()
    .filter(|s| s.can_advance_to(next))
    .collect()
}
