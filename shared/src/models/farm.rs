//! Farm and soil models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A farm (or field block) with its latest soil reading
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Farm {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub soil_health: Option<SoilHealth>,
    pub updated_at: DateTime<Utc>,
}

impl Farm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            location: None,
            soil_health: None,
            updated_at: Utc::now(),
        }
    }
}

/// Latest soil test result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoilHealth {
    pub ph: Decimal,
    /// Volumetric moisture in percent (0-100)
    pub moisture_percent: Decimal,
    pub recorded_at: Option<DateTime<Utc>>,
}
