//! In-memory store for development and tests
//!
//! Holds every collection in process and pushes inventory, task and farm
//! changes to subscribers over broadcast channels. Reads and writes can be
//! made to fail per collection to exercise the engine's error paths.
//!
//! ## Limitations
//!
//! - Single process only; nothing is persisted
//! - A subscriber that falls more than the channel capacity behind skips the
//!   missed changes (logged)

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use shared::{
    AlertEvent, CropRecord, CropStatus, Farm, FarmTask, InventoryItem, LedgerEntry, ReminderFlags,
};

use super::subscription::{ChangeEvent, ChangeFilter, Subscription, Tracked};
use super::{
    predecessors_of, AlertQuery, CropStore, FarmStore, InventoryStore, LedgerStore,
    NotificationStore, TaskStore,
};
use crate::error::{AppError, AppResult};

const FEED_CAPACITY: usize = 256;

/// Collections that can have failures injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Crops,
    Inventory,
    Tasks,
    Farms,
    Ledger,
    Notifications,
}

/// Converts a lock poison error to an internal error.
fn poison_err<T>(_: PoisonError<T>) -> AppError {
    AppError::Internal("store lock poisoned".to_string())
}

/// In-memory implementation of every store trait
pub struct MemoryStore {
    crops: RwLock<HashMap<Uuid, CropRecord>>,
    items: RwLock<HashMap<Uuid, InventoryItem>>,
    tasks: RwLock<HashMap<Uuid, FarmTask>>,
    farms: RwLock<HashMap<Uuid, Farm>>,
    ledger: RwLock<Vec<LedgerEntry>>,
    alerts: RwLock<Vec<AlertEvent>>,
    item_feed: broadcast::Sender<ChangeEvent<InventoryItem>>,
    task_feed: broadcast::Sender<ChangeEvent<FarmTask>>,
    farm_feed: broadcast::Sender<ChangeEvent<Farm>>,
    fail_on_read: RwLock<HashSet<Collection>>,
    fail_on_write: RwLock<HashSet<Collection>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (item_feed, _) = broadcast::channel(FEED_CAPACITY);
        let (task_feed, _) = broadcast::channel(FEED_CAPACITY);
        let (farm_feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            crops: RwLock::new(HashMap::new()),
            items: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
            farms: RwLock::new(HashMap::new()),
            ledger: RwLock::new(Vec::new()),
            alerts: RwLock::new(Vec::new()),
            item_feed,
            task_feed,
            farm_feed,
            fail_on_read: RwLock::new(HashSet::new()),
            fail_on_write: RwLock::new(HashSet::new()),
        }
    }

    // ========================================================================
    // Failure injection
    // ========================================================================

    pub fn fail_reads(&self, collection: Collection, failing: bool) {
        toggle(&self.fail_on_read, collection, failing);
    }

    pub fn fail_writes(&self, collection: Collection, failing: bool) {
        toggle(&self.fail_on_write, collection, failing);
    }

    fn check_read(&self, collection: Collection) -> AppResult<()> {
        if self.fail_on_read.read().map_err(poison_err)?.contains(&collection) {
            return Err(AppError::StorageError(format!(
                "injected read failure on {:?}",
                collection
            )));
        }
        Ok(())
    }

    fn check_write(&self, collection: Collection) -> AppResult<()> {
        if self.fail_on_write.read().map_err(poison_err)?.contains(&collection) {
            return Err(AppError::StorageError(format!(
                "injected write failure on {:?}",
                collection
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Record maintenance (the CRUD side of the wider system)
    // ========================================================================

    pub fn upsert_crop(&self, crop: CropRecord) -> AppResult<()> {
        self.crops.write().map_err(poison_err)?.insert(crop.id, crop);
        Ok(())
    }

    pub fn upsert_item(&self, mut item: InventoryItem) -> AppResult<()> {
        item.updated_at = Utc::now();
        self.items
            .write()
            .map_err(poison_err)?
            .insert(item.id, item.clone());
        // No receivers is fine
        let _ = self.item_feed.send(ChangeEvent::Upserted(item));
        Ok(())
    }

    pub fn remove_item(&self, id: Uuid) -> AppResult<()> {
        if self.items.write().map_err(poison_err)?.remove(&id).is_some() {
            let _ = self.item_feed.send(ChangeEvent::Removed(id));
        }
        Ok(())
    }

    pub fn upsert_task(&self, mut task: FarmTask) -> AppResult<()> {
        task.updated_at = Utc::now();
        self.tasks
            .write()
            .map_err(poison_err)?
            .insert(task.id, task.clone());
        let _ = self.task_feed.send(ChangeEvent::Upserted(task));
        Ok(())
    }

    pub fn upsert_farm(&self, mut farm: Farm) -> AppResult<()> {
        farm.updated_at = Utc::now();
        self.farms
            .write()
            .map_err(poison_err)?
            .insert(farm.id, farm.clone());
        let _ = self.farm_feed.send(ChangeEvent::Upserted(farm));
        Ok(())
    }

    pub fn add_ledger_entry(&self, entry: LedgerEntry) -> AppResult<()> {
        self.ledger.write().map_err(poison_err)?.push(entry);
        Ok(())
    }

    /// Number of subscribers currently following inventory changes
    pub fn inventory_subscriber_count(&self) -> usize {
        self.item_feed.receiver_count()
    }
}

fn toggle(set: &RwLock<HashSet<Collection>>, collection: Collection, on: bool) {
    let mut set = set.write().unwrap_or_else(PoisonError::into_inner);
    if on {
        set.insert(collection);
    } else {
        set.remove(&collection);
    }
}

/// Snapshot of current matching records followed by live changes.
/// `live` must be subscribed before `snapshot` is read.
fn push_feed<T>(
    collection: &'static str,
    live: broadcast::Receiver<ChangeEvent<T>>,
    snapshot: Vec<T>,
    filter: ChangeFilter,
) -> Subscription<T>
where
    T: Tracked + Clone + Send + 'static,
{
    let live = BroadcastStream::new(live);
    let snapshot_filter = filter.clone();
    let initial = stream::iter(
        snapshot
            .into_iter()
            .filter(move |r| snapshot_filter.matches(r.id()))
            .map(ChangeEvent::Upserted),
    );

    let live = live.filter_map(move |result| {
        let event = match result {
            Ok(event) if filter.matches(event.entity_id()) => Some(event),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(collection, error = %err, "Change feed subscriber lagged");
                None
            }
        };
        async move { event }
    });

    Subscription::new(initial.chain(live))
}

#[async_trait]
impl CropStore for MemoryStore {
    async fn list_crops(&self) -> AppResult<Vec<CropRecord>> {
        self.check_read(Collection::Crops)?;
        Ok(self.crops.read().map_err(poison_err)?.values().cloned().collect())
    }

    async fn get_crop(&self, id: Uuid) -> AppResult<Option<CropRecord>> {
        self.check_read(Collection::Crops)?;
        Ok(self.crops.read().map_err(poison_err)?.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: CropStatus,
        harvest_date: Option<NaiveDate>,
    ) -> AppResult<()> {
        self.check_write(Collection::Crops)?;
        let mut crops = self.crops.write().map_err(poison_err)?;
        let crop = crops
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Crop".to_string()))?;

        if !predecessors_of(status).contains(&crop.status) {
            return Err(AppError::InvalidStateTransition(format!(
                "crop {} cannot move from {} to {}",
                id, crop.status, status
            )));
        }

        crop.status = status;
        if harvest_date.is_some() {
            crop.harvest_date = harvest_date;
        }
        crop.updated_at = Utc::now();
        Ok(())
    }

    async fn set_reminders(&self, id: Uuid, reminders: ReminderFlags) -> AppResult<()> {
        self.check_write(Collection::Crops)?;
        let mut crops = self.crops.write().map_err(poison_err)?;
        let crop = crops
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Crop".to_string()))?;
        crop.reminders = reminders;
        crop.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list_items(&self) -> AppResult<Vec<InventoryItem>> {
        self.check_read(Collection::Inventory)?;
        Ok(self.items.read().map_err(poison_err)?.values().cloned().collect())
    }

    async fn subscribe_items(&self, filter: ChangeFilter) -> AppResult<Subscription<InventoryItem>> {
        let live = self.item_feed.subscribe();
        let snapshot = self.list_items().await?;
        Ok(push_feed("inventory", live, snapshot, filter))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn list_tasks(&self) -> AppResult<Vec<FarmTask>> {
        self.check_read(Collection::Tasks)?;
        Ok(self.tasks.read().map_err(poison_err)?.values().cloned().collect())
    }

    async fn subscribe_tasks(&self, filter: ChangeFilter) -> AppResult<Subscription<FarmTask>> {
        let live = self.task_feed.subscribe();
        let snapshot = self.list_tasks().await?;
        Ok(push_feed("tasks", live, snapshot, filter))
    }
}

#[async_trait]
impl FarmStore for MemoryStore {
    async fn list_farms(&self) -> AppResult<Vec<Farm>> {
        self.check_read(Collection::Farms)?;
        Ok(self.farms.read().map_err(poison_err)?.values().cloned().collect())
    }

    async fn subscribe_farms(&self, filter: ChangeFilter) -> AppResult<Subscription<Farm>> {
        let live = self.farm_feed.subscribe();
        let snapshot = self.list_farms().await?;
        Ok(push_feed("farms", live, snapshot, filter))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn list_entries_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<LedgerEntry>> {
        self.check_read(Collection::Ledger)?;
        Ok(self
            .ledger
            .read()
            .map_err(poison_err)?
            .iter()
            .filter(|e| e.date >= start && e.date < end)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_alert(&self, event: &AlertEvent) -> AppResult<()> {
        self.check_write(Collection::Notifications)?;
        self.alerts.write().map_err(poison_err)?.push(event.clone());
        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> AppResult<Option<AlertEvent>> {
        self.check_read(Collection::Notifications)?;
        Ok(self
            .alerts
            .read()
            .map_err(poison_err)?
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn mark_read(&self, id: Uuid) -> AppResult<bool> {
        self.check_write(Collection::Notifications)?;
        let mut alerts = self.alerts.write().map_err(poison_err)?;
        match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        self.check_write(Collection::Notifications)?;
        let mut alerts = self.alerts.write().map_err(poison_err)?;
        let mut marked = 0;
        for alert in alerts
            .iter_mut()
            .filter(|a| !a.read && a.target.includes(user_id))
        {
            alert.read = true;
            marked += 1;
        }
        Ok(marked)
    }

    async fn list_alerts(&self, query: AlertQuery) -> AppResult<Vec<AlertEvent>> {
        self.check_read(Collection::Notifications)?;
        let alerts = self.alerts.read().map_err(poison_err)?;
        Ok(alerts
            .iter()
            .rev()
            .filter(|a| query.user_id.map_or(true, |user| a.target.includes(user)))
            .filter(|a| !query.unread_only || !a.read)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, user_id: Uuid) -> AppResult<u64> {
        self.check_read(Collection::Notifications)?;
        let alerts = self.alerts.read().map_err(poison_err)?;
        Ok(alerts
            .iter()
            .filter(|a| !a.read && a.target.includes(user_id))
            .count() as u64)
    }
}
