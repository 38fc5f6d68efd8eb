//! Farm task models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseError;

/// A unit of farm work assigned to a worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FarmTask {
    pub id: Uuid,
    pub title: String,
    pub assignee_id: Option<Uuid>,
    pub due_date: DateTime<Utc>,
    pub status: TaskStatus,
    pub updated_at: DateTime<Utc>,
}

impl FarmTask {
    pub fn new(title: impl Into<String>, due_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            assignee_id: None,
            due_date,
            status: TaskStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status != TaskStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(ParseError::new("task status", other)),
        }
    }
}
