//! Transport-agnostic change feeds
//!
//! A [`Subscription`] is a cancellable stream of [`ChangeEvent`]s. Push
//! back-ends wrap a broadcast receiver; polling back-ends re-read the
//! collection on an interval and diff by `updated_at`. Rule code consumes both
//! the same way.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use shared::{Farm, FarmTask, InventoryItem};

use crate::error::AppResult;

/// A change observed in a collection
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    /// Record created or modified; carries the new state
    Upserted(T),
    Removed(Uuid),
}

impl<T: Tracked> ChangeEvent<T> {
    pub fn entity_id(&self) -> Uuid {
        match self {
            ChangeEvent::Upserted(record) => record.id(),
            ChangeEvent::Removed(id) => *id,
        }
    }
}

/// Which records a subscriber wants to hear about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChangeFilter {
    #[default]
    All,
    Ids(HashSet<Uuid>),
}

impl ChangeFilter {
    pub fn matches(&self, id: Uuid) -> bool {
        match self {
            ChangeFilter::All => true,
            ChangeFilter::Ids(ids) => ids.contains(&id),
        }
    }
}

/// Records that can be followed through a change feed
pub trait Tracked {
    fn id(&self) -> Uuid;
    fn updated_at(&self) -> DateTime<Utc>;
}

impl Tracked for InventoryItem {
    fn id(&self) -> Uuid {
        self.id
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Tracked for FarmTask {
    fn id(&self) -> Uuid {
        self.id
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Tracked for Farm {
    fn id(&self) -> Uuid {
        self.id
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Cancellable stream of change events. Dropping it (or calling
/// [`Subscription::cancel`]) releases the underlying feed.
pub struct Subscription<T> {
    stream: BoxStream<'static, ChangeEvent<T>>,
}

impl<T> Subscription<T> {
    pub fn new(stream: impl Stream<Item = ChangeEvent<T>> + Send + 'static) -> Self {
        Self {
            stream: stream.boxed(),
        }
    }

    /// Next change, or `None` once the feed has closed
    pub async fn next(&mut self) -> Option<ChangeEvent<T>> {
        self.stream.next().await
    }

    pub fn cancel(self) {}
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

struct PollState<T, F> {
    ticker: tokio::time::Interval,
    fetch: F,
    filter: ChangeFilter,
    seen: HashMap<Uuid, DateTime<Utc>>,
    pending: VecDeque<ChangeEvent<T>>,
}

impl<T: Tracked, F> PollState<T, F> {
    fn diff(&mut self, rows: Vec<T>) {
        let mut current = HashSet::with_capacity(rows.len());
        for row in rows {
            let id = row.id();
            if !self.filter.matches(id) {
                continue;
            }
            current.insert(id);
            let version = row.updated_at();
            if self.seen.insert(id, version) != Some(version) {
                self.pending.push_back(ChangeEvent::Upserted(row));
            }
        }

        let removed: Vec<Uuid> = self
            .seen
            .keys()
            .filter(|id| !current.contains(id))
            .copied()
            .collect();
        for id in removed {
            self.seen.remove(&id);
            self.pending.push_back(ChangeEvent::Removed(id));
        }
    }
}

/// Change feed built by re-reading a collection every `interval`.
///
/// The first read yields every matching record as `Upserted`; later reads
/// yield only records whose `updated_at` moved, plus removals. A failed read
/// is logged and retried on the next interval.
pub fn polling<T, F, Fut>(
    collection: &'static str,
    interval: Duration,
    filter: ChangeFilter,
    fetch: F,
) -> Subscription<T>
where
    T: Tracked + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<Vec<T>>> + Send + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = PollState {
        ticker,
        fetch,
        filter,
        seen: HashMap::new(),
        pending: VecDeque::new(),
    };

    let stream = stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            state.ticker.tick().await;
            match (state.fetch)().await {
                Ok(rows) => state.diff(rows),
                Err(err) => {
                    tracing::warn!(collection, error = %err, "Polling read failed; retrying next interval");
                }
            }
        }
    });

    Subscription::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn state(filter: ChangeFilter) -> PollState<InventoryItem, ()> {
        PollState {
            ticker: tokio::time::interval(Duration::from_secs(60)),
            fetch: (),
            filter,
            seen: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    #[tokio::test]
    async fn test_diff_emits_only_changes() {
        let mut item = InventoryItem::new("Seed maize", Decimal::from(20), "kg");
        let mut poll = state(ChangeFilter::All);

        poll.diff(vec![item.clone()]);
        assert_eq!(poll.pending.len(), 1);
        poll.pending.clear();

        poll.diff(vec![item.clone()]);
        assert!(poll.pending.is_empty());

        item.quantity = Decimal::from(4);
        item.updated_at = item.updated_at + chrono::Duration::seconds(5);
        poll.diff(vec![item.clone()]);
        assert_eq!(poll.pending.pop_front(), Some(ChangeEvent::Upserted(item.clone())));

        poll.diff(vec![]);
        assert_eq!(poll.pending.pop_front(), Some(ChangeEvent::Removed(item.id)));
    }

    #[tokio::test]
    async fn test_diff_respects_filter() {
        let watched = InventoryItem::new("Urea", Decimal::from(2), "kg");
        let other = InventoryItem::new("DAP", Decimal::from(2), "kg");
        let mut poll = state(ChangeFilter::Ids(HashSet::from([watched.id])));

        poll.diff(vec![watched.clone(), other]);
        assert_eq!(poll.pending.len(), 1);
        assert_eq!(poll.pending[0].entity_id(), watched.id);
    }

    #[tokio::test]
    async fn test_polling_first_read_is_snapshot() {
        let item = InventoryItem::new("Seed maize", Decimal::from(20), "kg");
        let rows = vec![item.clone()];
        let mut subscription = polling("inventory", Duration::from_millis(10), ChangeFilter::All, move || {
            let rows = rows.clone();
            async move { Ok(rows) }
        });

        assert_eq!(subscription.next().await, Some(ChangeEvent::Upserted(item)));
    }
}
