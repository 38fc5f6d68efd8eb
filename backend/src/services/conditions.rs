//! Multi-source condition monitor
//!
//! Evaluates inventory, tasks, soil readings and the ledger against fixed
//! thresholds. Sources are never written; every candidate goes through the
//! session's dedup before delivery.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use shared::{
    cashflow_alert, inventory_alert, soil_alerts, task_alert, AlertTarget, EntityRef, Farm,
    FarmTask, InventoryItem, NewAlert, SoilThresholds,
};

use super::session::MonitorSession;
use crate::error::{AppError, AppResult};
use crate::store::{ChangeEvent, FarmStore, InventoryStore, LedgerStore, TaskStore};

/// Thresholds for the condition rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionSettings {
    pub default_low_stock_threshold: Decimal,
    pub task_due_soon_window: Duration,
    pub soil: SoilThresholds,
}

impl Default for ConditionSettings {
    fn default() -> Self {
        Self {
            default_low_stock_threshold: Decimal::from(10),
            task_due_soon_window: Duration::hours(24),
            soil: SoilThresholds::default(),
        }
    }
}

/// Outcome of a scan over one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub evaluated: usize,
    pub alerts_emitted: usize,
    pub failed: usize,
}

impl ScanReport {
    fn record(&mut self, result: AppResult<usize>, what: &str) {
        self.evaluated += 1;
        match result {
            Ok(emitted) => self.alerts_emitted += emitted,
            Err(e) => {
                self.failed += 1;
                tracing::warn!("{} alert delivery failed: {}", what, e);
            }
        }
    }
}

pub struct ConditionMonitor {
    inventory: Arc<dyn InventoryStore>,
    tasks: Arc<dyn TaskStore>,
    farms: Arc<dyn FarmStore>,
    ledger: Arc<dyn LedgerStore>,
    settings: ConditionSettings,
}

impl ConditionMonitor {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        tasks: Arc<dyn TaskStore>,
        farms: Arc<dyn FarmStore>,
        ledger: Arc<dyn LedgerStore>,
        settings: ConditionSettings,
    ) -> Self {
        Self {
            inventory,
            tasks,
            farms,
            ledger,
            settings,
        }
    }

    // ========================================================================
    // Single records
    // ========================================================================

    /// Returns how many alerts were delivered (0 or 1)
    pub async fn check_item(&self, session: &MonitorSession, item: &InventoryItem) -> AppResult<usize> {
        let Some(kind) = inventory_alert(item, self.settings.default_low_stock_threshold) else {
            return Ok(0);
        };
        let alert = NewAlert::new(kind, AlertTarget::All, EntityRef::inventory_item(item.id));
        Ok(usize::from(session.emit(alert).await?.is_some()))
    }

    pub async fn check_task(
        &self,
        session: &MonitorSession,
        task: &FarmTask,
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let Some(kind) = task_alert(task, now, self.settings.task_due_soon_window) else {
            return Ok(0);
        };
        let alert = NewAlert::new(
            kind,
            AlertTarget::for_user(task.assignee_id),
            EntityRef::task(task.id),
        );
        Ok(usize::from(session.emit(alert).await?.is_some()))
    }

    /// A pH and a moisture alert are delivered independently
    pub async fn check_farm(&self, session: &MonitorSession, farm: &Farm) -> AppResult<usize> {
        let mut emitted = 0;
        let mut first_error: Option<AppError> = None;

        for kind in soil_alerts(farm, &self.settings.soil) {
            let alert = NewAlert::new(kind, AlertTarget::All, EntityRef::farm(farm.id));
            match session.emit(alert).await {
                Ok(event) => emitted += usize::from(event.is_some()),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(emitted),
        }
    }

    // ========================================================================
    // Full scans
    // ========================================================================

    pub async fn scan_inventory(&self, session: &MonitorSession) -> AppResult<ScanReport> {
        let items = self.inventory.list_items().await?;
        let mut report = ScanReport::default();
        for item in &items {
            report.record(self.check_item(session, item).await, "Inventory");
        }
        Ok(report)
    }

    pub async fn scan_tasks(&self, session: &MonitorSession, now: DateTime<Utc>) -> AppResult<ScanReport> {
        let tasks = self.tasks.list_tasks().await?;
        let mut report = ScanReport::default();
        for task in &tasks {
            report.record(self.check_task(session, task, now).await, "Task");
        }
        Ok(report)
    }

    pub async fn scan_farms(&self, session: &MonitorSession) -> AppResult<ScanReport> {
        let farms = self.farms.list_farms().await?;
        let mut report = ScanReport::default();
        for farm in &farms {
            report.record(self.check_farm(session, farm).await, "Soil");
        }
        Ok(report)
    }

    /// Compare this month's income and expenses
    pub async fn check_cashflow(&self, session: &MonitorSession, now: DateTime<Utc>) -> AppResult<usize> {
        let (start, end) = month_bounds(now.date_naive());
        let entries = self.ledger.list_entries_between(start, end).await?;

        let Some(kind) = cashflow_alert(&entries, now) else {
            return Ok(0);
        };
        let alert = NewAlert::new(kind, AlertTarget::All, EntityRef::ledger());
        Ok(usize::from(session.emit(alert).await?.is_some()))
    }

    // ========================================================================
    // Change feed handlers
    // ========================================================================

    pub async fn on_item_change(&self, session: &MonitorSession, change: ChangeEvent<InventoryItem>) {
        if let ChangeEvent::Upserted(item) = change {
            if let Err(e) = self.check_item(session, &item).await {
                tracing::warn!(item_id = %item.id, "Inventory alert delivery failed: {}", e);
            }
        }
    }

    pub async fn on_task_change(&self, session: &MonitorSession, change: ChangeEvent<FarmTask>) {
        if let ChangeEvent::Upserted(task) = change {
            if let Err(e) = self.check_task(session, &task, Utc::now()).await {
                tracing::warn!(task_id = %task.id, "Task alert delivery failed: {}", e);
            }
        }
    }

    pub async fn on_farm_change(&self, session: &MonitorSession, change: ChangeEvent<Farm>) {
        if let ChangeEvent::Upserted(farm) = change {
            if let Err(e) = self.check_farm(session, &farm).await {
                tracing::warn!(farm_id = %farm.id, "Soil alert delivery failed: {}", e);
            }
        }
    }
}

/// First day of the month containing `day` and first day of the next month
fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day.with_day(1).unwrap_or(day);
    let (year, month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    let end = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX);
    (start, end)
}
