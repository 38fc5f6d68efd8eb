//! Condition rules
//!
//! Stateless threshold checks against single records. A rule that holds
//! yields a candidate alert payload; the caller decides about deduplication
//! and delivery.

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    AlertKind, EntryType, Farm, FarmTask, InventoryItem, LedgerEntry, MonthlyCashflow,
};

/// Healthy soil bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoilThresholds {
    pub ph_min: Decimal,
    pub ph_max: Decimal,
    pub moisture_min_percent: Decimal,
}

impl Default for SoilThresholds {
    fn default() -> Self {
        Self {
            ph_min: Decimal::new(55, 1),
            ph_max: Decimal::new(80, 1),
            moisture_min_percent: Decimal::from(30),
        }
    }
}

/// Out of stock at zero, low stock at or below the item's threshold
pub fn inventory_alert(item: &InventoryItem, default_threshold: Decimal) -> Option<AlertKind> {
    // Negative balances are bookkeeping errors; they still mean nothing is on hand
    if item.quantity <= Decimal::ZERO {
        return Some(AlertKind::OutOfStock {
            item_name: item.name.clone(),
            unit: item.unit.clone(),
        });
    }

    let threshold = item.threshold_or(default_threshold);
    if item.quantity <= threshold {
        return Some(AlertKind::LowInventory {
            item_name: item.name.clone(),
            quantity: item.quantity.normalize(),
            threshold: threshold.normalize(),
            unit: item.unit.clone(),
        });
    }

    None
}

/// Overdue or due within `due_soon_window`, for tasks not yet completed
pub fn task_alert(
    task: &FarmTask,
    now: DateTime<Utc>,
    due_soon_window: Duration,
) -> Option<AlertKind> {
    if !task.is_open() {
        return None;
    }

    if task.due_date < now {
        return Some(AlertKind::TaskOverdue {
            task_title: task.title.clone(),
            due_date: task.due_date,
        });
    }

    let until_due = task.due_date - now;
    if until_due > Duration::zero() && until_due <= due_soon_window {
        return Some(AlertKind::TaskDueSoon {
            task_title: task.title.clone(),
            due_date: task.due_date,
        });
    }

    None
}

/// pH and moisture checks against the farm's latest soil reading
pub fn soil_alerts(farm: &Farm, thresholds: &SoilThresholds) -> Vec<AlertKind> {
    let Some(soil) = &farm.soil_health else {
        return Vec::new();
    };

    let mut alerts = Vec::new();
    if soil.ph < thresholds.ph_min || soil.ph > thresholds.ph_max {
        alerts.push(AlertKind::SoilPh {
            farm_name: farm.name.clone(),
            ph: soil.ph.normalize(),
        });
    }
    if soil.moisture_percent < thresholds.moisture_min_percent {
        alerts.push(AlertKind::LowMoisture {
            farm_name: farm.name.clone(),
            moisture_percent: soil.moisture_percent.normalize(),
        });
    }
    alerts
}

/// Income and expense totals for the calendar month containing `now`
pub fn monthly_cashflow(entries: &[LedgerEntry], now: DateTime<Utc>) -> MonthlyCashflow {
    let today = now.date_naive();
    let mut flow = MonthlyCashflow {
        year: today.year(),
        month: today.month(),
        income: Decimal::ZERO,
        expenses: Decimal::ZERO,
    };

    for entry in entries
        .iter()
        .filter(|e| e.date.year() == flow.year && e.date.month() == flow.month)
    {
        match entry.entry_type {
            EntryType::Income => flow.income += entry.amount,
            EntryType::Expense => flow.expenses += entry.amount,
        }
    }

    flow
}

/// Current-month expenses strictly greater than current-month income
pub fn cashflow_alert(entries: &[LedgerEntry], now: DateTime<Utc>) -> Option<AlertKind> {
    let flow = monthly_cashflow(entries, now);
    flow.is_negative().then(|| AlertKind::NegativeCashflow {
        month: flow.label(),
        income: flow.income,
        expenses: flow.expenses,
    })
}
