//! Core traits for the collaborators the harness drives
//!
//! These traits are the seams between the benchmark engine and the outside
//! world: how traffic is generated, where results are shipped, and where
//! statistics end up. Implementations live in their own modules
//! (`loadgen`, `client`, `sink`) or in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BenchResult;
use crate::pace::PaceSpec;
use crate::pipeline::EventEmitter;
use crate::record::{EventsRecordBatch, RecordReply};

// ============================================================================
// Load Generator Trait
// ============================================================================

/// Generates traffic against the system under test
///
/// Every method blocks (awaits) until the traffic it started is complete.
/// Implementations report event lifecycle timestamps through the
/// [`EventEmitter`] handed to [`LoadGenerator::run_pace`]; clones of that
/// emitter must not outlive the call, otherwise the sender cannot close its
/// pipeline.
#[async_trait]
pub trait LoadGenerator: Send + Sync {
    /// Run traffic that is not recorded, to warm up the system under test
    async fn warmup(&self, pace: PaceSpec, payload_size: usize) -> BenchResult<()>;

    /// Run one measured phase at `pace.rps` for `pace.duration`
    async fn run_pace(
        &self,
        phase: usize,
        pace: PaceSpec,
        payload_size: usize,
        emitter: &EventEmitter,
    ) -> BenchResult<()>;

    /// Send the marker that tells receivers a GC boundary was crossed
    async fn send_gc_event(&self) -> BenchResult<()>;

    /// Send the marker that tells receivers the run is over
    async fn send_end_event(&self) -> BenchResult<()>;
}

// ============================================================================
// Record Publisher Trait
// ============================================================================

/// Ships event records to the aggregator
#[async_trait]
pub trait RecordPublisher: Send + Sync {
    /// Submit one batch; a failure means the batch was not recorded
    async fn publish(&self, batch: EventsRecordBatch) -> BenchResult<RecordReply>;
}

// ============================================================================
// Metrics Sink Trait
// ============================================================================

/// Write-mostly store for benchmark results
///
/// Individual writes may fail without aborting a run; [`MetricsSink::store`]
/// is called exactly once at the end and its failure is fatal.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Record named values at a point in time
    fn add_sample_point(&self, at: DateTime<Utc>, values: &[(&str, f64)])
        -> Result<(), SinkError>;

    /// Record an error observed at a point in time
    fn add_error(&self, at: DateTime<Utc>, message: &str) -> Result<(), SinkError>;

    /// Record a run-level summary value
    fn add_run_aggregate(&self, name: &str, value: f64) -> Result<(), SinkError>;

    /// Flush everything; returns a human-readable description of the output
    async fn store(&self) -> Result<String, SinkError>;
}

/// Metrics sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink no longer accepts writes
    #[error("sink already stored")]
    Closed,

    /// A value could not be represented by the backend
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// Metric name
        name: String,
        /// Offending value
        value: f64,
    },

    /// Serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO failure while storing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
