//! PostgreSQL store
//!
//! Change feeds are produced by polling each table on the configured interval
//! and diffing rows by `updated_at`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use shared::{
    AlertEvent, AlertKind, AlertTarget, CropRecord, CropStatus, EntityRef, Farm, FarmTask,
    InventoryItem, LedgerEntry, ReminderFlags, SoilHealth,
};

use super::subscription::{polling, ChangeFilter, Subscription};
use super::{
    predecessors_of, AlertQuery, CropStore, FarmStore, InventoryStore, LedgerStore,
    NotificationStore, TaskStore,
};
use crate::error::{AppError, AppResult};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
    poll_interval: Duration,
}

impl PgStore {
    pub fn new(db: PgPool, poll_interval: Duration) -> Self {
        Self { db, poll_interval }
    }

    /// Apply the bundled migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))
    }
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CropRow {
    id: Uuid,
    name: String,
    profile_name: String,
    field_name: Option<String>,
    owner_id: Option<Uuid>,
    planting_date: NaiveDate,
    status: String,
    harvest_date: Option<NaiveDate>,
    growth_started_sent: bool,
    harvest_approaching_sent: bool,
    harvested_sent: bool,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CropRow> for CropRecord {
    type Error = AppError;

    fn try_from(row: CropRow) -> Result<Self, Self::Error> {
        Ok(CropRecord {
            id: row.id,
            name: row.name,
            profile_name: row.profile_name,
            field_name: row.field_name,
            owner_id: row.owner_id,
            planting_date: row.planting_date,
            status: row.status.parse()?,
            harvest_date: row.harvest_date,
            reminders: ReminderFlags {
                growth_started_sent: row.growth_started_sent,
                harvest_approaching_sent: row.harvest_approaching_sent,
                harvested_sent: row.harvested_sent,
            },
            updated_at: row.updated_at,
        })
    }
}

const CROP_COLUMNS: &str = "id, name, profile_name, field_name, owner_id, planting_date, status, \
     harvest_date, growth_started_sent, harvest_approaching_sent, harvested_sent, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    id: Uuid,
    name: String,
    category: Option<String>,
    quantity: Decimal,
    unit: String,
    low_stock_threshold: Option<Decimal>,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryItem {
    fn from(row: InventoryRow) -> Self {
        InventoryItem {
            id: row.id,
            name: row.name,
            category: row.category,
            quantity: row.quantity,
            unit: row.unit,
            low_stock_threshold: row.low_stock_threshold,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    assignee_id: Option<Uuid>,
    due_date: DateTime<Utc>,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for FarmTask {
    type Error = AppError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(FarmTask {
            id: row.id,
            title: row.title,
            assignee_id: row.assignee_id,
            due_date: row.due_date,
            status: row.status.parse()?,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FarmRow {
    id: Uuid,
    name: String,
    location: Option<String>,
    soil_ph: Option<Decimal>,
    soil_moisture_percent: Option<Decimal>,
    soil_recorded_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<FarmRow> for Farm {
    fn from(row: FarmRow) -> Self {
        // A reading needs both values to be judged
        let soil_health = match (row.soil_ph, row.soil_moisture_percent) {
            (Some(ph), Some(moisture_percent)) => Some(SoilHealth {
                ph,
                moisture_percent,
                recorded_at: row.soil_recorded_at,
            }),
            _ => None,
        };
        Farm {
            id: row.id,
            name: row.name,
            location: row.location,
            soil_health,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    amount: Decimal,
    entry_type: String,
    entry_date: NaiveDate,
    category: Option<String>,
    description: Option<String>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: row.id,
            amount: row.amount,
            entry_type: row.entry_type.parse()?,
            date: row.entry_date,
            category: row.category,
            description: row.description,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    payload: Json<AlertKind>,
    title: String,
    message: String,
    priority: String,
    target_user_id: Option<Uuid>,
    source_kind: String,
    source_id: Uuid,
    created_at: DateTime<Utc>,
    read: bool,
}

impl TryFrom<AlertRow> for AlertEvent {
    type Error = AppError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(AlertEvent {
            id: row.id,
            kind: row.payload.0,
            title: row.title,
            message: row.message,
            priority: row.priority.parse()?,
            target: AlertTarget::for_user(row.target_user_id),
            source: EntityRef::new(row.source_kind.parse()?, row.source_id),
            created_at: row.created_at,
            read: row.read,
        })
    }
}

const ALERT_COLUMNS: &str = "id, payload, title, message, priority, target_user_id, source_kind, \
     source_id, created_at, read";

fn target_user(target: &AlertTarget) -> Option<Uuid> {
    match target {
        AlertTarget::All => None,
        AlertTarget::User(id) => Some(*id),
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Reads shared by list and subscribe
// ============================================================================

impl PgStore {
    async fn fetch_items(db: PgPool) -> AppResult<Vec<InventoryItem>> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT id, name, category, quantity, unit, low_stock_threshold, updated_at
            FROM inventory_items
            ORDER BY name
            "#,
        )
        .fetch_all(&db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn fetch_tasks(db: PgPool) -> AppResult<Vec<FarmTask>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, title, assignee_id, due_date, status, updated_at
            FROM farm_tasks
            ORDER BY due_date
            "#,
        )
        .fetch_all(&db)
        .await?;

        convert_all(rows)
    }

    async fn fetch_farms(db: PgPool) -> AppResult<Vec<Farm>> {
        let rows = sqlx::query_as::<_, FarmRow>(
            r#"
            SELECT id, name, location, soil_ph, soil_moisture_percent, soil_recorded_at, updated_at
            FROM farms
            ORDER BY name
            "#,
        )
        .fetch_all(&db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl CropStore for PgStore {
    async fn list_crops(&self) -> AppResult<Vec<CropRecord>> {
        let rows = sqlx::query_as::<_, CropRow>(&format!(
            "SELECT {} FROM crops ORDER BY planting_date",
            CROP_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn get_crop(&self, id: Uuid) -> AppResult<Option<CropRecord>> {
        let row = sqlx::query_as::<_, CropRow>(&format!(
            "SELECT {} FROM crops WHERE id = $1",
            CROP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(CropRecord::try_from).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: CropStatus,
        harvest_date: Option<NaiveDate>,
    ) -> AppResult<()> {
        let allowed: Vec<String> = predecessors_of(status)
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect();

        // The status guard makes the forward-only check atomic with the write
        let result = sqlx::query(
            r#"
            UPDATE crops
            SET status = $2,
                harvest_date = COALESCE($3, harvest_date),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($4)
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(harvest_date)
        .bind(&allowed)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_crop(id).await? {
                None => Err(AppError::NotFound("Crop".to_string())),
                Some(crop) => Err(AppError::InvalidStateTransition(format!(
                    "crop {} cannot move from {} to {}",
                    id, crop.status, status
                ))),
            };
        }

        Ok(())
    }

    async fn set_reminders(&self, id: Uuid, reminders: ReminderFlags) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE crops
            SET growth_started_sent = $2,
                harvest_approaching_sent = $3,
                harvested_sent = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reminders.growth_started_sent)
        .bind(reminders.harvest_approaching_sent)
        .bind(reminders.harvested_sent)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Crop".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn list_items(&self) -> AppResult<Vec<InventoryItem>> {
        Self::fetch_items(self.db.clone()).await
    }

    async fn subscribe_items(&self, filter: ChangeFilter) -> AppResult<Subscription<InventoryItem>> {
        let db = self.db.clone();
        Ok(polling("inventory", self.poll_interval, filter, move || {
            Self::fetch_items(db.clone())
        }))
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn list_tasks(&self) -> AppResult<Vec<FarmTask>> {
        Self::fetch_tasks(self.db.clone()).await
    }

    async fn subscribe_tasks(&self, filter: ChangeFilter) -> AppResult<Subscription<FarmTask>> {
        let db = self.db.clone();
        Ok(polling("tasks", self.poll_interval, filter, move || {
            Self::fetch_tasks(db.clone())
        }))
    }
}

#[async_trait]
impl FarmStore for PgStore {
    async fn list_farms(&self) -> AppResult<Vec<Farm>> {
        Self::fetch_farms(self.db.clone()).await
    }

    async fn subscribe_farms(&self, filter: ChangeFilter) -> AppResult<Subscription<Farm>> {
        let db = self.db.clone();
        Ok(polling("farms", self.poll_interval, filter, move || {
            Self::fetch_farms(db.clone())
        }))
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn list_entries_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT id, amount, entry_type, entry_date, category, description
            FROM ledger_entries
            WHERE entry_date >= $1 AND entry_date < $2
            ORDER BY entry_date
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_alert(&self, event: &AlertEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, alert_type, payload, title, message, priority,
                                target_user_id, source_kind, source_id, created_at, read)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id)
        .bind(event.type_tag())
        .bind(Json(&event.kind))
        .bind(&event.title)
        .bind(&event.message)
        .bind(event.priority.as_str())
        .bind(target_user(&event.target))
        .bind(event.source.kind.as_str())
        .bind(event.source.id)
        .bind(event.created_at)
        .bind(event.read)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> AppResult<Option<AlertEvent>> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {} FROM alerts WHERE id = $1",
            ALERT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(AlertEvent::try_from).transpose()
    }

    async fn mark_read(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("UPDATE alerts SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET read = TRUE
            WHERE read = FALSE AND (target_user_id IS NULL OR target_user_id = $1)
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_alerts(&self, query: AlertQuery) -> AppResult<Vec<AlertEvent>> {
        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            SELECT {}
            FROM alerts
            WHERE ($1::uuid IS NULL OR target_user_id IS NULL OR target_user_id = $1)
              AND ($2 = FALSE OR read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            ALERT_COLUMNS
        ))
        .bind(query.user_id)
        .bind(query.unread_only)
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn unread_count(&self, user_id: Uuid) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM alerts
            WHERE read = FALSE AND (target_user_id IS NULL OR target_user_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count.max(0) as u64)
    }
}
