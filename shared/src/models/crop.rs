//! Crop record models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseError;

/// A planted crop tracked through its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropRecord {
    pub id: Uuid,
    /// Display name, e.g. "North field maize"
    pub name: String,
    /// Growth profile reference (crop variety name)
    pub profile_name: String,
    pub field_name: Option<String>,
    /// User responsible for the crop; alerts go to everybody when unset
    pub owner_id: Option<Uuid>,
    pub planting_date: NaiveDate,
    pub status: CropStatus,
    pub harvest_date: Option<NaiveDate>,
    pub reminders: ReminderFlags,
    pub updated_at: DateTime<Utc>,
}

impl CropRecord {
    /// Create a freshly planted crop
    pub fn planted(
        name: impl Into<String>,
        profile_name: impl Into<String>,
        planting_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            profile_name: profile_name.into(),
            field_name: None,
            owner_id: None,
            planting_date,
            status: CropStatus::Planted,
            harvest_date: None,
            reminders: ReminderFlags::default(),
            updated_at: Utc::now(),
        }
    }

    /// Whole days elapsed since planting (negative for future plantings)
    pub fn days_grown(&self, now: DateTime<Utc>) -> i64 {
        (now.date_naive() - self.planting_date).num_days()
    }
}

/// Lifecycle status of a crop. Only ever moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CropStatus {
    Planted,
    Growing,
    Harvested,
    Failed,
}

impl CropStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropStatus::Planted => "planted",
            CropStatus::Growing => "growing",
            CropStatus::Harvested => "harvested",
            CropStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CropStatus::Harvested | CropStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects planted -> growing -> harvested
    pub fn can_advance_to(&self, next: CropStatus) -> bool {
        match (self, next) {
            (CropStatus::Planted, CropStatus::Growing) => true,
            (CropStatus::Planted | CropStatus::Growing, CropStatus::Harvested) => true,
            (CropStatus::Planted | CropStatus::Growing, CropStatus::Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for CropStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CropStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planted" => Ok(CropStatus::Planted),
            "growing" => Ok(CropStatus::Growing),
            "harvested" => Ok(CropStatus::Harvested),
            "failed" => Ok(CropStatus::Failed),
            other => Err(ParseError::new("crop status", other)),
        }
    }
}

/// One-time alerts already delivered for a crop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReminderFlags {
    pub growth_started_sent: bool,
    pub harvest_approaching_sent: bool,
    pub harvested_sent: bool,
}
