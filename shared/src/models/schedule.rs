//! Maintenance schedule models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Recurring husbandry category.
///
/// The declaration order is the tie-break order used when two categories
/// fall on the same day offset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Irrigation,
    Weeding,
    Fertilizer,
    PestControl,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Irrigation => "irrigation",
            TaskCategory::Weeding => "weeding",
            TaskCategory::Fertilizer => "fertilizer",
            TaskCategory::PestControl => "pest_control",
        }
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskCategory::Irrigation => write!(f, "Irrigation"),
            TaskCategory::Weeding => write!(f, "Weeding"),
            TaskCategory::Fertilizer => write!(f, "Fertilizer"),
            TaskCategory::PestControl => write!(f, "Pest control"),
        }
    }
}

/// One calendar-dated maintenance occurrence derived from a growth profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledTaskOccurrence {
    pub category: TaskCategory,
    /// Days after planting, always within `0..growth_days`
    pub day_offset: i32,
    pub date: NaiveDate,
    /// Only present for pest control
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pesticides: Option<Vec<String>>,
}
