//! Common types used across the platform

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a stored textual value does not map onto a known variant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Kind of record an alert was raised for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Crop,
    InventoryItem,
    Task,
    Farm,
    Ledger,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Crop => "crop",
            EntityKind::InventoryItem => "inventory_item",
            EntityKind::Task => "task",
            EntityKind::Farm => "farm",
            EntityKind::Ledger => "ledger",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crop" => Ok(EntityKind::Crop),
            "inventory_item" => Ok(EntityKind::InventoryItem),
            "task" => Ok(EntityKind::Task),
            "farm" => Ok(EntityKind::Farm),
            "ledger" => Ok(EntityKind::Ledger),
            other => Err(ParseError::new("entity kind", other)),
        }
    }
}

/// Reference to the source record of an alert
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn crop(id: Uuid) -> Self {
        Self::new(EntityKind::Crop, id)
    }

    pub fn inventory_item(id: Uuid) -> Self {
        Self::new(EntityKind::InventoryItem, id)
    }

    pub fn task(id: Uuid) -> Self {
        Self::new(EntityKind::Task, id)
    }

    pub fn farm(id: Uuid) -> Self {
        Self::new(EntityKind::Farm, id)
    }

    /// The ledger is a single collection, so it is referenced by the nil id
    pub fn ledger() -> Self {
        Self::new(EntityKind::Ledger, Uuid::nil())
    }
}

/// Recipient of an alert: one user or everybody
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlertTarget {
    #[default]
    All,
    User(Uuid),
}

impl AlertTarget {
    /// Whether an alert with this target is visible to the given user
    pub fn includes(&self, user_id: Uuid) -> bool {
        match self {
            AlertTarget::All => true,
            AlertTarget::User(id) => *id == user_id,
        }
    }

    pub fn for_user(user_id: Option<Uuid>) -> Self {
        user_id.map(AlertTarget::User).unwrap_or(AlertTarget::All)
    }
}

impl std::fmt::Display for AlertTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertTarget::All => f.write_str("all"),
            AlertTarget::User(id) => write!(f, "{}", id),
        }
    }
}

impl std::str::FromStr for AlertTarget {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(AlertTarget::All);
        }
        Uuid::parse_str(s)
            .map(AlertTarget::User)
            .map_err(|_| ParseError::new("alert target", s))
    }
}

// Stored and transmitted as the plain string form ("all" or a user id)
impl Serialize for AlertTarget {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AlertTarget {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_target_round_trip_strings() {
        let user = Uuid::new_v4();
        assert_eq!("all".parse::<AlertTarget>().unwrap(), AlertTarget::All);
        assert_eq!(
            user.to_string().parse::<AlertTarget>().unwrap(),
            AlertTarget::User(user)
        );
        assert!("everyone".parse::<AlertTarget>().is_err());
    }

    #[test]
    fn test_alert_target_includes() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(AlertTarget::All.includes(user));
        assert!(AlertTarget::User(user).includes(user));
        assert!(!AlertTarget::User(user).includes(other));
    }

    #[test]
    fn test_alert_target_serializes_as_string() {
        let json = serde_json::to_string(&AlertTarget::All).unwrap();
        assert_eq!(json, "\"all\"");
    }
}
