//! Session-scoped alert deduplication

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use shared::DedupKey;

/// Remembers which alerts were emitted during the current monitoring session
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: Mutex<HashSet<DedupKey>>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn seen(&self) -> MutexGuard<'_, HashSet<DedupKey>> {
        // The set stays consistent even if a holder panicked
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True the first time a key is offered, false afterwards
    pub fn should_emit(&self, key: &DedupKey) -> bool {
        self.seen().insert(key.clone())
    }

    /// Forget a key so a failed delivery can be retried
    pub fn release(&self, key: &DedupKey) {
        self.seen().remove(key);
    }

    pub fn reset(&self) {
        self.seen().clear();
    }

    pub fn len(&self) -> usize {
        self.seen().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
