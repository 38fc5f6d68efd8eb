//! Alert models
//!
//! Every alert category is a variant of [`AlertKind`] carrying exactly the
//! fields that category needs. Titles and messages are derived from the
//! payload so the same logical event always renders the same text.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CropStatus;
use crate::types::{AlertTarget, EntityRef, ParseError};

/// Alert urgency
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// High and critical alerts are also pushed as system notifications
    pub fn is_urgent(&self) -> bool {
        *self >= Priority::High
    }
}

impl std::str::FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(ParseError::new("priority", other)),
        }
    }
}

/// Alert category with its payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    CropStatusUpdate {
        crop_name: String,
        from: CropStatus,
        to: CropStatus,
    },
    CropHarvested {
        crop_name: String,
        harvest_date: NaiveDate,
    },
    HarvestApproaching {
        crop_name: String,
        expected_harvest: NaiveDate,
    },
    IrrigationDue {
        crop_name: String,
        day: i64,
    },
    WeedingDue {
        crop_name: String,
        day: i64,
    },
    FertilizerDue {
        crop_name: String,
        day: i64,
    },
    PestControlDue {
        crop_name: String,
        day: i64,
        pesticides: Vec<String>,
    },
    OutOfStock {
        item_name: String,
        unit: String,
    },
    LowInventory {
        item_name: String,
        quantity: Decimal,
        threshold: Decimal,
        unit: String,
    },
    TaskOverdue {
        task_title: String,
        due_date: DateTime<Utc>,
    },
    TaskDueSoon {
        task_title: String,
        due_date: DateTime<Utc>,
    },
    #[serde(rename = "soil_ph_alert")]
    SoilPh {
        farm_name: String,
        ph: Decimal,
    },
    LowMoisture {
        farm_name: String,
        moisture_percent: Decimal,
    },
    NegativeCashflow {
        month: String,
        income: Decimal,
        expenses: Decimal,
    },
}

impl AlertKind {
    /// Stable snake_case tag, also used as the system notification tag
    pub fn type_tag(&self) -> &'static str {
        match self {
            AlertKind::CropStatusUpdate { .. } => "crop_status_update",
            AlertKind::CropHarvested { .. } => "crop_harvested",
            AlertKind::HarvestApproaching { .. } => "harvest_approaching",
            AlertKind::IrrigationDue { .. } => "irrigation_due",
            AlertKind::WeedingDue { .. } => "weeding_due",
            AlertKind::FertilizerDue { .. } => "fertilizer_due",
            AlertKind::PestControlDue { .. } => "pest_control_due",
            AlertKind::OutOfStock { .. } => "out_of_stock",
            AlertKind::LowInventory { .. } => "low_inventory",
            AlertKind::TaskOverdue { .. } => "task_overdue",
            AlertKind::TaskDueSoon { .. } => "task_due_soon",
            AlertKind::SoilPh { .. } => "soil_ph_alert",
            AlertKind::LowMoisture { .. } => "low_moisture",
            AlertKind::NegativeCashflow { .. } => "negative_cashflow",
        }
    }

    pub fn default_priority(&self) -> Priority {
        match self {
            AlertKind::CropStatusUpdate { .. } => Priority::Low,
            AlertKind::CropHarvested { .. } => Priority::High,
            AlertKind::HarvestApproaching { .. } => Priority::Medium,
            AlertKind::IrrigationDue { .. } => Priority::Medium,
            AlertKind::WeedingDue { .. } => Priority::Low,
            AlertKind::FertilizerDue { .. } => Priority::Medium,
            AlertKind::PestControlDue { .. } => Priority::Medium,
            AlertKind::OutOfStock { .. } => Priority::High,
            AlertKind::LowInventory { .. } => Priority::Medium,
            AlertKind::TaskOverdue { .. } => Priority::High,
            AlertKind::TaskDueSoon { .. } => Priority::Medium,
            AlertKind::SoilPh { .. } => Priority::High,
            AlertKind::LowMoisture { .. } => Priority::High,
            AlertKind::NegativeCashflow { .. } => Priority::High,
        }
    }

    pub fn title(&self) -> String {
        match self {
            AlertKind::CropStatusUpdate { crop_name, .. } => {
                format!("Crop Status Update: {}", crop_name)
            }
            AlertKind::CropHarvested { crop_name, .. } => format!("Crop Harvested: {}", crop_name),
            AlertKind::HarvestApproaching { crop_name, .. } => {
                format!("Harvest Approaching: {}", crop_name)
            }
            AlertKind::IrrigationDue { crop_name, .. } => format!("Irrigation Due: {}", crop_name),
            AlertKind::WeedingDue { crop_name, .. } => format!("Weeding Due: {}", crop_name),
            AlertKind::FertilizerDue { crop_name, .. } => {
                format!("Fertilizer Application Due: {}", crop_name)
            }
            AlertKind::PestControlDue { crop_name, .. } => {
                format!("Pest Control Due: {}", crop_name)
            }
            AlertKind::OutOfStock { item_name, .. } => format!("Out of Stock: {}", item_name),
            AlertKind::LowInventory { item_name, .. } => format!("Low Inventory: {}", item_name),
            AlertKind::TaskOverdue { task_title, .. } => format!("Task Overdue: {}", task_title),
            AlertKind::TaskDueSoon { task_title, .. } => format!("Task Due Soon: {}", task_title),
            AlertKind::SoilPh { farm_name, .. } => format!("Soil pH Alert: {}", farm_name),
            AlertKind::LowMoisture { farm_name, .. } => {
                format!("Low Soil Moisture: {}", farm_name)
            }
            AlertKind::NegativeCashflow { .. } => "Negative Cash Flow".to_string(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AlertKind::CropStatusUpdate {
                crop_name,
                from,
                to,
            } => format!("'{}' has moved from {} to {}.", crop_name, from, to),
            AlertKind::CropHarvested {
                crop_name,
                harvest_date,
            } => format!(
                "'{}' completed its growth period and was marked harvested on {}.",
                crop_name, harvest_date
            ),
            AlertKind::HarvestApproaching {
                crop_name,
                expected_harvest,
            } => format!(
                "'{}' is expected to be ready for harvest on {}. Prepare labour and storage.",
                crop_name, expected_harvest
            ),
            AlertKind::IrrigationDue { crop_name, day } => {
                format!("'{}' needs watering (day {} after planting).", crop_name, day)
            }
            AlertKind::WeedingDue { crop_name, day } => {
                format!("'{}' is due for weeding (day {} after planting).", crop_name, day)
            }
            AlertKind::FertilizerDue { crop_name, day } => format!(
                "'{}' is due for fertilizer application (day {} after planting).",
                crop_name, day
            ),
            AlertKind::PestControlDue {
                crop_name,
                day,
                pesticides,
            } => {
                let products = if pesticides.is_empty() {
                    "no recommended products listed".to_string()
                } else {
                    pesticides.join(", ")
                };
                format!(
                    "'{}' is due for pest control (day {} after planting). Recommended: {}.",
                    crop_name, day, products
                )
            }
            AlertKind::OutOfStock { item_name, .. } => {
                format!("'{}' is out of stock. Reorder as soon as possible.", item_name)
            }
            AlertKind::LowInventory {
                item_name,
                quantity,
                threshold,
                unit,
            } => format!(
                "'{}' is running low: {} {} left (threshold {} {}).",
                item_name, quantity, unit, threshold, unit
            ),
            AlertKind::TaskOverdue {
                task_title,
                due_date,
            } => format!(
                "'{}' was due on {} and is not completed.",
                task_title,
                due_date.format("%Y-%m-%d %H:%M UTC")
            ),
            AlertKind::TaskDueSoon {
                task_title,
                due_date,
            } => format!(
                "'{}' is due on {}.",
                task_title,
                due_date.format("%Y-%m-%d %H:%M UTC")
            ),
            AlertKind::SoilPh { farm_name, ph } => format!(
                "Soil pH on '{}' is {}, outside the healthy range of 5.5 to 8.0.",
                farm_name, ph
            ),
            AlertKind::LowMoisture {
                farm_name,
                moisture_percent,
            } => format!(
                "Soil moisture on '{}' is {}%, below the 30% minimum.",
                farm_name, moisture_percent
            ),
            AlertKind::NegativeCashflow { month, .. } => {
                format!("Expenses exceed income for {}.", month)
            }
        }
    }
}

/// A candidate alert produced by a monitor, before deduplication and persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub kind: AlertKind,
    pub priority: Priority,
    pub target: AlertTarget,
    pub source: EntityRef,
}

impl NewAlert {
    /// Build an alert with the category's default priority
    pub fn new(kind: AlertKind, target: AlertTarget, source: EntityRef) -> Self {
        let priority = kind.default_priority();
        Self {
            kind,
            priority,
            target,
            source,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            alert_type: self.kind.type_tag(),
            source_id: self.source.id,
            message: self.kind.message(),
        }
    }
}

/// Identity of one logical alert within a monitoring session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub alert_type: &'static str,
    pub source_id: Uuid,
    pub message: String,
}

/// A persisted alert. Immutable except for `read`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub id: Uuid,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub target: AlertTarget,
    pub source: EntityRef,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl AlertEvent {
    /// Materialize a candidate alert as an unread event
    pub fn from_new(alert: NewAlert, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: alert.kind.title(),
            message: alert.kind.message(),
            kind: alert.kind,
            priority: alert.priority,
            target: alert.target,
            source: alert.source,
            created_at,
            read: false,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        self.kind.type_tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low_stock() -> AlertKind {
        AlertKind::LowInventory {
            item_name: "DAP fertilizer".to_string(),
            quantity: Decimal::from(5),
            threshold: Decimal::from(10),
            unit: "bags".to_string(),
        }
    }

    #[test]
    fn test_type_tags_are_snake_case() {
        let kinds = [
            low_stock(),
            AlertKind::NegativeCashflow {
                month: "2024-05".to_string(),
                income: Decimal::ZERO,
                expenses: Decimal::ONE,
            },
            AlertKind::SoilPh {
                farm_name: "Home".to_string(),
                ph: Decimal::new(50, 1),
            },
        ];
        for kind in kinds {
            assert!(kind
                .type_tag()
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn test_serde_tag_matches_type_tag() {
        let kind = AlertKind::SoilPh {
            farm_name: "Home".to_string(),
            ph: Decimal::new(50, 1),
        };
        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value["type"], kind.type_tag());

        let kind = low_stock();
        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value["type"], kind.type_tag());
    }

    #[test]
    fn test_dedup_key_identity() {
        let source = EntityRef::inventory_item(Uuid::new_v4());
        let a = NewAlert::new(low_stock(), AlertTarget::All, source);
        let b = NewAlert::new(low_stock(), AlertTarget::All, source);
        assert_eq!(a.dedup_key(), b.dedup_key());

        let other_source = NewAlert::new(
            low_stock(),
            AlertTarget::All,
            EntityRef::inventory_item(Uuid::new_v4()),
        );
        assert_ne!(a.dedup_key(), other_source.dedup_key());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert!(Priority::High.is_urgent());
        assert!(Priority::Critical.is_urgent());
        assert!(!Priority::Medium.is_urgent());
    }

    #[test]
    fn test_event_from_new_is_unread() {
        let alert = NewAlert::new(
            low_stock(),
            AlertTarget::All,
            EntityRef::inventory_item(Uuid::new_v4()),
        );
        let event = AlertEvent::from_new(alert.clone(), Utc::now());
        assert!(!event.read);
        assert_eq!(event.title, alert.kind.title());
        assert_eq!(event.message, alert.kind.message());
        assert_eq!(event.priority, Priority::Medium);
    }
}
