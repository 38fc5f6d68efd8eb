//! Monitoring session shared by every monitor of one engine

use std::sync::Arc;

use shared::{AlertEvent, NewAlert};

use super::dedup::DedupStore;
use super::notification::NotificationSink;
use crate::error::AppResult;

/// Alert history and delivery for one engine instance
pub struct MonitorSession {
    dedup: DedupStore,
    sink: Arc<NotificationSink>,
}

impl MonitorSession {
    pub fn new(sink: Arc<NotificationSink>) -> Self {
        Self {
            dedup: DedupStore::new(),
            sink,
        }
    }

    /// Deliver an alert unless it was already delivered this session.
    ///
    /// Returns `Ok(None)` for a suppressed duplicate. When persisting fails the
    /// key is released so the next pass can try again.
    pub async fn emit(&self, alert: NewAlert) -> AppResult<Option<AlertEvent>> {
        let key = alert.dedup_key();
        if !self.dedup.should_emit(&key) {
            tracing::trace!(alert_type = key.alert_type, source = %key.source_id, "Duplicate alert suppressed");
            return Ok(None);
        }

        match self.sink.create(alert).await {
            Ok(event) => Ok(Some(event)),
            Err(e) => {
                self.dedup.release(&key);
                Err(e)
            }
        }
    }

    pub fn sink(&self) -> &Arc<NotificationSink> {
        &self.sink
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    /// Start a fresh session
    pub fn reset(&self) {
        self.dedup.reset();
    }
}
