//! Event lifecycle records exchanged between senders, receivers and the aggregator

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single lifecycle observation of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTimestamp {
    /// Event identifier, the correlation key across all classes
    pub event_id: String,

    /// When the observation was made
    pub at: DateTime<Utc>,
}

impl EventTimestamp {
    /// Create a timestamp for the given event
    pub fn new(event_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            event_id: event_id.into(),
            at,
        }
    }
}

/// Stage of an event's life a record belongs to
///
/// Encoded on the wire as its upper-case name. Names this version does not
/// know decode to [`RecordClass::Unknown`] so that a single odd record does
/// not fail the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordClass {
    /// Event handed to the system under test
    Sent,
    /// System under test acknowledged the event
    Accepted,
    /// System under test rejected the event
    Failed,
    /// Event observed by a downstream consumer
    Received,
    /// Unrecognised class name
    Unknown(String),
}

impl RecordClass {
    /// Upper-case wire name
    pub fn as_str(&self) -> &str {
        match self {
            RecordClass::Sent => "SENT",
            RecordClass::Accepted => "ACCEPTED",
            RecordClass::Failed => "FAILED",
            RecordClass::Received => "RECEIVED",
            RecordClass::Unknown(name) => name,
        }
    }
}

impl From<String> for RecordClass {
    fn from(name: String) -> Self {
        match name.as_str() {
            "SENT" => RecordClass::Sent,
            "ACCEPTED" => RecordClass::Accepted,
            "FAILED" => RecordClass::Failed,
            "RECEIVED" => RecordClass::Received,
            _ => RecordClass::Unknown(name),
        }
    }
}

impl From<RecordClass> for String {
    fn from(class: RecordClass) -> Self {
        class.as_str().to_string()
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All timestamps of one class, keyed by event id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsRecord {
    /// Which stage these timestamps describe
    pub class: RecordClass,

    /// Event id to timestamp
    pub events: HashMap<String, DateTime<Utc>>,
}

impl EventsRecord {
    /// Create an empty record
    pub fn new(class: RecordClass) -> Self {
        Self {
            class,
            events: HashMap::new(),
        }
    }

    /// Create an empty record with room for `capacity` events
    pub fn with_capacity(class: RecordClass, capacity: usize) -> Self {
        Self {
            class,
            events: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a timestamp unless the id is already present
    ///
    /// Returns `false` for a duplicate; the stored timestamp is left untouched.
    pub fn insert_first(&mut self, event_id: String, at: DateTime<Utc>) -> bool {
        use std::collections::hash_map::Entry;

        match self.events.entry(event_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(at);
                true
            }
        }
    }

    /// Merge another set of events into this one, first writer wins
    pub fn merge_events(&mut self, events: HashMap<String, DateTime<Utc>>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        self.events.reserve(events.len());

        for (event_id, at) in events {
            if self.events.contains_key(&event_id) {
                outcome.duplicates.push(event_id);
            } else {
                self.events.insert(event_id, at);
                outcome.inserted += 1;
            }
        }

        outcome
    }

    /// Look up the timestamp of an event
    pub fn get(&self, event_id: &str) -> Option<DateTime<Utc>> {
        self.events.get(event_id).copied()
    }

    /// Whether the event is present
    pub fn contains(&self, event_id: &str) -> bool {
        self.events.contains_key(event_id)
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether there are no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All timestamps sorted ascending
    pub fn sorted_timestamps(&self) -> Vec<DateTime<Utc>> {
        let mut values: Vec<DateTime<Utc>> = self.events.values().copied().collect();
        values.sort_unstable();
        values
    }
}

/// Result of merging events into a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Number of new ids stored
    pub inserted: usize,

    /// Ids that were already present and were skipped
    pub duplicates: Vec<String>,
}

/// Records submitted together in one RPC call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsRecordBatch {
    /// Records, possibly of different classes
    pub items: Vec<EventsRecord>,
}

impl EventsRecordBatch {
    /// Create a batch from records
    pub fn new(items: Vec<EventsRecord>) -> Self {
        Self { items }
    }

    /// Total number of events across all records
    pub fn event_count(&self) -> usize {
        self.items.iter().map(EventsRecord::len).sum()
    }
}

/// Reply to a `RecordEvents` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReply {
    /// Number of records carried by the batch
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_record_class_wire_names() {
        assert_eq!(
            serde_json::to_string(&RecordClass::Accepted).unwrap(),
            "\"ACCEPTED\""
        );
        let class: RecordClass = serde_json::from_str("\"RECEIVED\"").unwrap();
        assert_eq!(class, RecordClass::Received);
    }

    #[test]
    fn test_unknown_class_decodes() {
        let class: RecordClass = serde_json::from_str("\"DROPPED\"").unwrap();
        assert_eq!(class, RecordClass::Unknown("DROPPED".into()));
        assert_eq!(class.to_string(), "DROPPED");
    }

    #[test]
    fn test_insert_first_keeps_original() {
        let mut record = EventsRecord::new(RecordClass::Sent);
        assert!(record.insert_first("a".into(), ts(0)));
        assert!(!record.insert_first("a".into(), ts(5)));
        assert_eq!(record.get("a"), Some(ts(0)));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_merge_reports_duplicates() {
        let mut record = EventsRecord::new(RecordClass::Accepted);
        record.insert_first("a".into(), ts(1));

        let incoming = HashMap::from([("a".to_string(), ts(9)), ("b".to_string(), ts(2))]);
        let outcome = record.merge_events(incoming);

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.duplicates, vec!["a".to_string()]);
        assert_eq!(record.get("a"), Some(ts(1)));
        assert_eq!(record.get("b"), Some(ts(2)));
    }

    #[test]
    fn test_sorted_timestamps() {
        let mut record = EventsRecord::new(RecordClass::Sent);
        record.insert_first("c".into(), ts(3));
        record.insert_first("a".into(), ts(1));
        record.insert_first("b".into(), ts(2));
        assert_eq!(record.sorted_timestamps(), vec![ts(1), ts(2), ts(3)]);
    }

    #[test]
    fn test_batch_wire_format() {
        let mut record = EventsRecord::new(RecordClass::Failed);
        record.insert_first("x".into(), ts(0));
        let batch = EventsRecordBatch::new(vec![record]);

        let json = serde_json::to_string(&batch).unwrap();
        assert!(json.contains("\"class\":\"FAILED\""));
        assert!(json.contains("\"items\""));

        let decoded: EventsRecordBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, batch);
        assert_eq!(decoded.event_count(), 1);
    }
}
