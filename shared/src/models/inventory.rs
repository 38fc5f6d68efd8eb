//! Inventory models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stocked input (seed, fertilizer, feed, chemical, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    /// Per-item low stock threshold; the monitor default applies when unset
    pub low_stock_threshold: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, quantity: Decimal, unit: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category: None,
            quantity,
            unit: unit.into(),
            low_stock_threshold: None,
            updated_at: Utc::now(),
        }
    }

    pub fn threshold_or(&self, default_threshold: Decimal) -> Decimal {
        self.low_stock_threshold.unwrap_or(default_threshold)
    }
}
