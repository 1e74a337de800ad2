//! Event timestamp pipeline
//!
//! Load generation workers push `(event_id, at)` pairs into three bounded
//! channels, one per outbound class. A single drain task owns the three
//! record maps and pulls from all channels until every one of them is closed
//! and empty. Channels close when the last [`EventEmitter`] clone is dropped.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::channel::ChannelConfig;
use crate::record::{EventTimestamp, EventsRecord, EventsRecordBatch, RecordClass};

/// Producer handle for the three outbound streams
///
/// Cheap to clone; every clone keeps the streams open.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sent: mpsc::Sender<EventTimestamp>,
    accepted: mpsc::Sender<EventTimestamp>,
    failed: mpsc::Sender<EventTimestamp>,
}

impl EventEmitter {
    /// Record that an event was handed to the system under test
    pub async fn sent(&self, event_id: impl Into<String>, at: DateTime<Utc>) {
        Self::push(&self.sent, RecordClass::Sent, event_id, at).await;
    }

    /// Record that the system under test accepted an event
    pub async fn accepted(&self, event_id: impl Into<String>, at: DateTime<Utc>) {
        Self::push(&self.accepted, RecordClass::Accepted, event_id, at).await;
    }

    /// Record that the system under test rejected an event
    pub async fn failed(&self, event_id: impl Into<String>, at: DateTime<Utc>) {
        Self::push(&self.failed, RecordClass::Failed, event_id, at).await;
    }

    async fn push(
        tx: &mpsc::Sender<EventTimestamp>,
        class: RecordClass,
        event_id: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        let timestamp = EventTimestamp::new(event_id, at);
        if let Err(e) = tx.send(timestamp).await {
            // Only possible once the drain task is gone
            tracing::warn!(class = %class, event_id = %e.0.event_id, "Events pipeline closed, dropping timestamp");
        }
    }
}

/// The three outbound records owned by the drain task
#[derive(Debug, Clone, PartialEq)]
pub struct SenderRecords {
    /// SENT timestamps
    pub sent: EventsRecord,
    /// ACCEPTED timestamps
    pub accepted: EventsRecord,
    /// FAILED timestamps
    pub failed: EventsRecord,
}

impl SenderRecords {
    /// Create empty records with room for `capacity` events each
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sent: EventsRecord::with_capacity(RecordClass::Sent, capacity),
            accepted: EventsRecord::with_capacity(RecordClass::Accepted, capacity),
            failed: EventsRecord::with_capacity(RecordClass::Failed, capacity),
        }
    }

    /// Package the records as one RPC batch (SENT, ACCEPTED, FAILED)
    pub fn into_batch(self) -> EventsRecordBatch {
        EventsRecordBatch::new(vec![self.sent, self.accepted, self.failed])
    }
}

/// Consumer side of the pipeline
#[derive(Debug)]
pub struct EventPipeline {
    sent_rx: mpsc::Receiver<EventTimestamp>,
    accepted_rx: mpsc::Receiver<EventTimestamp>,
    failed_rx: mpsc::Receiver<EventTimestamp>,
    records: SenderRecords,
}

impl EventPipeline {
    /// Create the pipeline and its producer handle
    pub fn new(config: &ChannelConfig) -> (Self, EventEmitter) {
        let buffer = config.bounded_events_buffer();
        let (sent_tx, sent_rx) = mpsc::channel(buffer);
        let (accepted_tx, accepted_rx) = mpsc::channel(buffer);
        let (failed_tx, failed_rx) = mpsc::channel(buffer);

        let pipeline = Self {
            sent_rx,
            accepted_rx,
            failed_rx,
            records: SenderRecords::with_capacity(config.bounded_record_capacity()),
        };
        let emitter = EventEmitter {
            sent: sent_tx,
            accepted: accepted_tx,
            failed: failed_tx,
        };

        (pipeline, emitter)
    }

    /// Drain all three streams until they are closed and empty
    ///
    /// Order across classes is unspecified. Within a class the first
    /// timestamp seen for an id is kept.
    pub async fn drain(mut self) -> SenderRecords {
        tracing::debug!("Events processor started");

        loop {
            tokio::select! {
                Some(e) = self.sent_rx.recv() => {
                    Self::record(&mut self.records.sent, e);
                }
                Some(e) = self.accepted_rx.recv() => {
                    Self::record(&mut self.records.accepted, e);
                }
                Some(e) = self.failed_rx.recv() => {
                    Self::record(&mut self.records.failed, e);
                }
                else => break,
            }
        }

        tracing::debug!(
            sent = self.records.sent.len(),
            accepted = self.records.accepted.len(),
            failed = self.records.failed.len(),
            "Events processor drained all streams"
        );

        self.records
    }

    fn record(record: &mut EventsRecord, e: EventTimestamp) {
        if !record.insert_first(e.event_id, e.at) {
            tracing::debug!(class = %record.class, "Ignoring repeated timestamp for event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    #[tokio::test]
    async fn test_drain_collects_all_classes() {
        let (pipeline, emitter) = EventPipeline::new(&ChannelConfig::default());
        let drain = tokio::spawn(pipeline.drain());

        emitter.sent("a", ts(0)).await;
        emitter.sent("b", ts(1)).await;
        emitter.accepted("a", ts(5)).await;
        emitter.failed("b", ts(6)).await;
        drop(emitter);

        let records = drain.await.unwrap();
        assert_eq!(records.sent.len(), 2);
        assert_eq!(records.accepted.get("a"), Some(ts(5)));
        assert_eq!(records.failed.get("b"), Some(ts(6)));
    }

    #[tokio::test]
    async fn test_drain_loses_nothing_after_close() {
        // Small buffer so producers block and interleave with the consumer
        let config = ChannelConfig::default().with_events_buffer(4);
        let (pipeline, emitter) = EventPipeline::new(&config);
        let drain = tokio::spawn(pipeline.drain());

        let mut producers = Vec::new();
        for worker in 0..4 {
            let emitter = emitter.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..250 {
                    let id = format!("w{worker}-{i}");
                    emitter.sent(id.clone(), ts(i)).await;
                    if i % 2 == 0 {
                        emitter.accepted(id, ts(i + 1)).await;
                    } else {
                        emitter.failed(id, ts(i + 1)).await;
                    }
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }
        drop(emitter);

        let records = drain.await.unwrap();
        assert_eq!(records.sent.len(), 1000);
        assert_eq!(records.accepted.len(), 500);
        assert_eq!(records.failed.len(), 500);
    }

    #[tokio::test]
    async fn test_huge_rate_plan_builds_pipeline() {
        let plan = crate::pace::PacePlan::parse("1e18:1").unwrap();
        let config = ChannelConfig::from_estimate(plan.capacity());

        let (pipeline, emitter) = EventPipeline::new(&config);
        let drain = tokio::spawn(pipeline.drain());
        emitter.sent("a", ts(0)).await;
        drop(emitter);

        let records = drain.await.unwrap();
        assert_eq!(records.sent.len(), 1);
    }

    #[tokio::test]
    async fn test_drain_terminates_with_no_events() {
        let (pipeline, emitter) = EventPipeline::new(&ChannelConfig::default());
        drop(emitter);
        let records = pipeline.drain().await;
        assert!(records.sent.is_empty());
        assert!(records.accepted.is_empty());
        assert!(records.failed.is_empty());
    }

    #[tokio::test]
    async fn test_first_timestamp_wins_within_class() {
        let (pipeline, emitter) = EventPipeline::new(&ChannelConfig::default());
        let drain = tokio::spawn(pipeline.drain());

        emitter.sent("a", ts(0)).await;
        emitter.sent("a", ts(100)).await;
        drop(emitter);

        let records = drain.await.unwrap();
        assert_eq!(records.sent.get("a"), Some(ts(0)));
    }

    #[test]
    fn test_into_batch_order() {
        let batch = SenderRecords::with_capacity(0).into_batch();
        let classes: Vec<RecordClass> = batch.items.iter().map(|r| r.class.clone()).collect();
        assert_eq!(
            classes,
            vec![RecordClass::Sent, RecordClass::Accepted, RecordClass::Failed]
        );
    }
}
