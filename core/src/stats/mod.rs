//! Statistics engine
//!
//! Turns the four merged records into latency samples, error markers,
//! throughput series and run aggregates on a [`MetricsSink`]:
//!
//! - `pl`: send latency (SENT to ACCEPTED) in seconds, at the send time
//! - `dl`: end-to-end latency (SENT to RECEIVED) in seconds, at the send time
//! - `st` / `dt` / `ft`: sent, delivered and failed events per second
//! - `pe` / `de`: publish and delivery error totals
//!
//! Individual sink writes may fail; they are logged, counted and skipped.

mod latency;
mod summary;
mod throughput;

pub use latency::{seconds_between, Correlation};
pub use summary::{LatencyHistogram, LatencyPercentiles, RunSummary, EXACT_PERCENTILE_LIMIT};
pub use throughput::throughput_series;

use chrono::{DateTime, Utc};

use crate::record::{EventsRecord, RecordClass};
use crate::traits::{MetricsSink, SinkError};

/// Send latency sample name
pub const SEND_LATENCY: &str = "pl";
/// End-to-end latency sample name
pub const E2E_LATENCY: &str = "dl";
/// Sent throughput sample name
pub const SENT_THROUGHPUT: &str = "st";
/// Delivered throughput sample name
pub const DELIVERED_THROUGHPUT: &str = "dt";
/// Failed throughput sample name
pub const FAILED_THROUGHPUT: &str = "ft";
/// Publish error aggregate name
pub const PUBLISH_ERRORS: &str = "pe";
/// Delivery error aggregate name
pub const DELIVERY_ERRORS: &str = "de";

/// Error recorded for an event the broker rejected
pub const DELIVERY_FAILED_ON_BROKER: &str = "Failed on broker";
/// Error recorded for an event neither accepted nor failed
pub const DELIVERY_MISSING_FROM_FAILED: &str = "Event not accepted but missing from failed map";
/// Error recorded for an event never received
pub const NOT_DELIVERED: &str = "Event not delivered";

/// FAILED only gets a throughput series above this many entries
const FAILED_THROUGHPUT_MIN_EVENTS: usize = 2;

/// Read-only copy of the four records a statistics pass runs over
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSnapshot {
    /// SENT timestamps
    pub sent: EventsRecord,
    /// ACCEPTED timestamps
    pub accepted: EventsRecord,
    /// FAILED timestamps
    pub failed: EventsRecord,
    /// RECEIVED timestamps
    pub received: EventsRecord,
}

impl Default for RecordSnapshot {
    fn default() -> Self {
        Self {
            sent: EventsRecord::new(RecordClass::Sent),
            accepted: EventsRecord::new(RecordClass::Accepted),
            failed: EventsRecord::new(RecordClass::Failed),
            received: EventsRecord::new(RecordClass::Received),
        }
    }
}

/// Sink wrapper that logs and counts failed writes instead of aborting
pub(crate) struct SinkWriter<'a> {
    sink: &'a dyn MetricsSink,
    skipped: usize,
}

impl<'a> SinkWriter<'a> {
    fn new(sink: &'a dyn MetricsSink) -> Self {
        Self { sink, skipped: 0 }
    }

    pub(crate) fn sample(&mut self, at: DateTime<Utc>, name: &str, value: f64) {
        let result = self.sink.add_sample_point(at, &[(name, value)]);
        self.check(result, name);
    }

    pub(crate) fn error(&mut self, at: DateTime<Utc>, message: &str) {
        let result = self.sink.add_error(at, message);
        self.check(result, "error");
    }

    fn aggregate(&mut self, name: &str, value: f64) {
        let result = self.sink.add_run_aggregate(name, value);
        self.check(result, name);
    }

    fn check(&mut self, result: Result<(), SinkError>, what: &str) {
        if let Err(e) = result {
            self.skipped += 1;
            tracing::warn!(metric = what, error = %e, "Failed to write to metrics sink, skipping");
        }
    }
}

/// Runs the statistics pass over a snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct StatsEngine;

impl StatsEngine {
    /// Create an engine
    pub fn new() -> Self {
        Self
    }

    /// Write every sample, error and aggregate for `records` to `sink`
    ///
    /// Does not call [`MetricsSink::store`]; the caller owns that step.
    pub fn publish(&self, records: &RecordSnapshot, sink: &dyn MetricsSink) -> RunSummary {
        let mut writer = SinkWriter::new(sink);

        tracing::info!(
            sent = records.sent.len(),
            accepted = records.accepted.len(),
            failed = records.failed.len(),
            received = records.received.len(),
            "Computing statistics"
        );

        let correlation = latency::correlate(records, &mut writer);

        Self::publish_throughput(&mut writer, SENT_THROUGHPUT, &records.sent);
        Self::publish_throughput(&mut writer, DELIVERED_THROUGHPUT, &records.received);
        if records.failed.len() > FAILED_THROUGHPUT_MIN_EVENTS {
            Self::publish_throughput(&mut writer, FAILED_THROUGHPUT, &records.failed);
        }

        writer.aggregate(PUBLISH_ERRORS, correlation.publish_errors as f64);
        writer.aggregate(DELIVERY_ERRORS, correlation.delivery_errors as f64);

        let summary = RunSummary {
            sent: records.sent.len(),
            accepted: records.accepted.len(),
            failed: records.failed.len(),
            received: records.received.len(),
            publish_errors: correlation.publish_errors,
            delivery_errors: correlation.delivery_errors,
            inconsistent: correlation.inconsistent,
            skipped_writes: writer.skipped,
            send_latency: LatencyPercentiles::from_seconds(&correlation.send_latencies),
            e2e_latency: LatencyPercentiles::from_seconds(&correlation.e2e_latencies),
        };

        tracing::debug!(?summary, "Statistics computed");
        summary
    }

    fn publish_throughput(writer: &mut SinkWriter<'_>, name: &str, record: &EventsRecord) {
        for (at, value) in throughput_series(&record.sorted_timestamps()) {
            writer.sample(at, name, value);
        }
    }
}
