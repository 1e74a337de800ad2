//! Wire constants shared by the load generator, receiver and aggregator

/// Aggregator route accepting `EventsRecordBatch` submissions
pub const RECORD_EVENTS_PATH: &str = "/v1/events-records";

/// Health route exposed by the aggregator
pub const HEALTH_PATH: &str = "/healthz";

/// CloudEvents binary-mode header carrying the event id
pub const CE_ID: &str = "ce-id";

/// CloudEvents header carrying the event type
pub const CE_TYPE: &str = "ce-type";

/// CloudEvents header carrying the event source
pub const CE_SOURCE: &str = "ce-source";

/// CloudEvents header carrying the spec version
pub const CE_SPECVERSION: &str = "ce-specversion";

/// CloudEvents spec version produced by the load generator
pub const SPEC_VERSION: &str = "1.0";

/// Type of measured events
pub const MEASURED_EVENT_TYPE: &str = "perf-test-event";

/// Type of the marker sent after each phase
pub const GC_EVENT_TYPE: &str = "gc.perf-test-event";

/// Type of the marker sent once the run is over
pub const END_EVENT_TYPE: &str = "end.perf-test-event";

/// What a receiver should do with an incoming event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Record a RECEIVED timestamp
    Measured,
    /// Phase boundary marker
    Gc,
    /// End-of-run marker
    End,
}

impl EventKind {
    /// Classify a `ce-type` value; anything unknown is measured
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            GC_EVENT_TYPE => EventKind::Gc,
            END_EVENT_TYPE => EventKind::End,
            _ => EventKind::Measured,
        }
    }
}
