//! Shared aggregator state: four record buckets and a batch counter

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::channel::MAX_RECORD_CAPACITY;
use crate::record::{EventsRecord, MergeOutcome, RecordClass};
use crate::stats::RecordSnapshot;

/// Storage the `RecordEvents` handler merges into
pub trait RecordStore: Send + Sync {
    /// Merge events into the bucket for `class`, first writer wins
    ///
    /// Returns `None` when there is no bucket for the class.
    fn merge(&self, class: &RecordClass, events: HashMap<String, DateTime<Utc>>)
        -> Option<MergeOutcome>;

    /// Copy of the bucket for `class`
    fn snapshot(&self, class: &RecordClass) -> Option<EventsRecord>;
}

/// Four independently locked records, one per known class
#[derive(Debug)]
pub struct AggregatedState {
    sent: Mutex<EventsRecord>,
    accepted: Mutex<EventsRecord>,
    failed: Mutex<EventsRecord>,
    received: Mutex<EventsRecord>,
}

impl AggregatedState {
    /// Create empty buckets
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create empty buckets with room for `capacity` events each
    ///
    /// The pre-allocation is capped at [`MAX_RECORD_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_RECORD_CAPACITY);
        Self {
            sent: Mutex::new(EventsRecord::with_capacity(RecordClass::Sent, capacity)),
            accepted: Mutex::new(EventsRecord::with_capacity(RecordClass::Accepted, capacity)),
            failed: Mutex::new(EventsRecord::with_capacity(RecordClass::Failed, capacity)),
            received: Mutex::new(EventsRecord::with_capacity(RecordClass::Received, capacity)),
        }
    }

    fn bucket(&self, class: &RecordClass) -> Option<&Mutex<EventsRecord>> {
        match class {
            RecordClass::Sent => Some(&self.sent),
            RecordClass::Accepted => Some(&self.accepted),
            RecordClass::Failed => Some(&self.failed),
            RecordClass::Received => Some(&self.received),
            RecordClass::Unknown(_) => None,
        }
    }

    /// Copy all four buckets
    pub fn snapshot_all(&self) -> RecordSnapshot {
        RecordSnapshot {
            sent: self.sent.lock().clone(),
            accepted: self.accepted.lock().clone(),
            failed: self.failed.lock().clone(),
            received: self.received.lock().clone(),
        }
    }
}

impl Default for AggregatedState {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for AggregatedState {
    fn merge(
        &self,
        class: &RecordClass,
        events: HashMap<String, DateTime<Utc>>,
    ) -> Option<MergeOutcome> {
        let bucket = self.bucket(class)?;
        Some(bucket.lock().merge_events(events))
    }

    fn snapshot(&self, class: &RecordClass) -> Option<EventsRecord> {
        self.bucket(class).map(|bucket| bucket.lock().clone())
    }
}

/// Counts completed `RecordEvents` calls
///
/// Each call signals exactly once, so waiting for `n` wakes on the `n`-th
/// signal and not before.
#[derive(Debug)]
pub struct BatchCounter {
    tx: watch::Sender<usize>,
}

impl BatchCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    /// Record one completed call; returns the new count
    pub fn signal(&self) -> usize {
        let mut count = 0;
        self.tx.send_modify(|c| {
            *c += 1;
            count = *c;
        });
        count
    }

    /// Calls recorded so far
    pub fn received(&self) -> usize {
        *self.tx.borrow()
    }

    /// Wait until at least `expected` calls were recorded
    pub async fn wait_for(&self, expected: usize) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|count| *count >= expected).await;
    }
}

impl Default for BatchCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_merge_first_writer_wins() {
        let state = AggregatedState::new();

        let first = HashMap::from([("a".to_string(), at(0))]);
        let second = HashMap::from([("a".to_string(), at(5)), ("b".to_string(), at(6))]);

        let outcome = state.merge(&RecordClass::Sent, first).unwrap();
        assert_eq!(outcome.inserted, 1);

        let outcome = state.merge(&RecordClass::Sent, second).unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.duplicates, vec!["a".to_string()]);

        let sent = state.snapshot(&RecordClass::Sent).unwrap();
        assert_eq!(sent.get("a"), Some(at(0)));
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn test_classes_are_separate_buckets() {
        let state = AggregatedState::new();
        state.merge(&RecordClass::Accepted, HashMap::from([("a".to_string(), at(1))]));
        state.merge(&RecordClass::Received, HashMap::from([("a".to_string(), at(2))]));

        let snapshot = state.snapshot_all();
        assert!(snapshot.sent.is_empty());
        assert_eq!(snapshot.accepted.get("a"), Some(at(1)));
        assert_eq!(snapshot.received.get("a"), Some(at(2)));
    }

    #[test]
    fn test_unknown_class_has_no_bucket() {
        let state = AggregatedState::new();
        let class = RecordClass::Unknown("DROPPED".into());
        assert!(state.merge(&class, HashMap::new()).is_none());
        assert!(state.snapshot(&class).is_none());
    }

    #[tokio::test]
    async fn test_counter_wakes_on_exact_count() {
        let counter = Arc::new(BatchCounter::new());

        let waiter = {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move { counter.wait_for(3).await })
        };

        assert_eq!(counter.signal(), 1);
        assert_eq!(counter.signal(), 2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        assert_eq!(counter.signal(), 3);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.received(), 3);
    }

    #[tokio::test]
    async fn test_counter_already_reached() {
        let counter = BatchCounter::new();
        counter.signal();
        tokio::time::timeout(Duration::from_millis(100), counter.wait_for(1))
            .await
            .unwrap();
    }
}
