//! Fixtures shared by the backend integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::sync::broadcast;

use farm_ops_backend::services::{MonitorSession, NotificationSink};
use farm_ops_backend::store::{AlertQuery, MemoryStore, Stores};
use shared::{AlertEvent, CropRecord};

/// In-memory stores plus a session writing to them
pub struct Harness {
    pub memory: Arc<MemoryStore>,
    pub stores: Stores,
    pub sink: Arc<NotificationSink>,
    pub session: MonitorSession,
}

impl Harness {
    pub fn new() -> Self {
        let memory = Arc::new(MemoryStore::new());
        let stores = Stores::in_memory(memory.clone());
        let sink = Arc::new(NotificationSink::new(stores.notifications.clone(), 64));
        let session = MonitorSession::new(sink.clone());
        Self {
            memory,
            stores,
            sink,
            session,
        }
    }

    pub async fn alerts(&self) -> Vec<AlertEvent> {
        self.sink
            .list(AlertQuery {
                user_id: None,
                unread_only: false,
                limit: 1000,
            })
            .await
            .expect("list alerts")
    }

    pub async fn alerts_of_type(&self, alert_type: &str) -> Vec<AlertEvent> {
        self.alerts()
            .await
            .into_iter()
            .filter(|a| a.type_tag() == alert_type)
            .collect()
    }

    pub async fn crop(&self, crop: &CropRecord) -> CropRecord {
        self.stores
            .crops
            .get_crop(crop.id)
            .await
            .expect("read crop")
            .expect("crop exists")
    }
}

/// Fixed evaluation instant: 2024-06-01 09:00 UTC
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

/// A crop of `profile` planted `days` days before `now`
pub fn crop_grown_for(profile: &str, days: i64, now: DateTime<Utc>) -> CropRecord {
    let planting: NaiveDate = now.date_naive() - chrono::Duration::days(days);
    CropRecord::planted(format!("{} plot", profile), profile, planting)
}

/// Wait for the next live alert of a type
pub async fn next_alert_of_type(
    rx: &mut broadcast::Receiver<AlertEvent>,
    alert_type: &str,
) -> Option<AlertEvent> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(alert) if alert.type_tag() == alert_type => return Some(alert),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
