//! Metrics sink implementations
//!
//! - [`MemorySink`] keeps everything in memory; useful on its own for tests
//!   and dry runs, and the buffer behind the file sink.
//! - [`JsonFileSink`] writes the collected run to a JSON document on `store`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::traits::{MetricsSink, SinkError};

/// A set of named values at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    /// Sample time
    pub at: DateTime<Utc>,
    /// Metric name to value
    pub values: BTreeMap<String, f64>,
}

/// An error observed at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPoint {
    /// Error time
    pub at: DateTime<Utc>,
    /// Description
    pub message: String,
}

/// Everything a sink has collected for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    /// Time-series samples in insertion order
    pub samples: Vec<SamplePoint>,
    /// Errors in insertion order
    pub errors: Vec<ErrorPoint>,
    /// Run-level aggregates
    pub aggregates: BTreeMap<String, f64>,
}

impl RunResults {
    /// All values recorded under `name`, with their times
    pub fn series(&self, name: &str) -> Vec<(DateTime<Utc>, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.values.get(name).map(|v| (s.at, *v)))
            .collect()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    results: RunResults,
    stored: bool,
}

/// In-memory metrics sink
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything collected so far
    pub fn results(&self) -> RunResults {
        self.state.lock().results.clone()
    }

    /// Whether `store` has been called
    pub fn is_stored(&self) -> bool {
        self.state.lock().stored
    }

    fn write<F>(&self, f: F) -> Result<(), SinkError>
    where
        F: FnOnce(&mut RunResults),
    {
        let mut state = self.state.lock();
        if state.stored {
            return Err(SinkError::Closed);
        }
        f(&mut state.results);
        Ok(())
    }

    fn close(&self) -> Result<RunResults, SinkError> {
        let mut state = self.state.lock();
        if state.stored {
            return Err(SinkError::Closed);
        }
        state.stored = true;
        Ok(state.results.clone())
    }
}

fn check_finite(name: &str, value: f64) -> Result<(), SinkError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SinkError::InvalidValue {
            name: name.to_string(),
            value,
        })
    }
}

#[async_trait]
impl MetricsSink for MemorySink {
    fn add_sample_point(
        &self,
        at: DateTime<Utc>,
        values: &[(&str, f64)],
    ) -> Result<(), SinkError> {
        for (name, value) in values {
            check_finite(name, *value)?;
        }
        let values = values
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        self.write(|results| results.samples.push(SamplePoint { at, values }))
    }

    fn add_error(&self, at: DateTime<Utc>, message: &str) -> Result<(), SinkError> {
        let message = message.to_string();
        self.write(|results| results.errors.push(ErrorPoint { at, message }))
    }

    fn add_run_aggregate(&self, name: &str, value: f64) -> Result<(), SinkError> {
        check_finite(name, value)?;
        self.write(|results| {
            results.aggregates.insert(name.to_string(), value);
        })
    }

    async fn store(&self) -> Result<String, SinkError> {
        let results = self.close()?;
        Ok(format!(
            "{} samples, {} errors, {} aggregates kept in memory",
            results.samples.len(),
            results.errors.len(),
            results.aggregates.len()
        ))
    }
}

/// Identity of the benchmark a run belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Benchmark key
    pub benchmark_key: String,
    /// Human-readable benchmark name
    pub benchmark_name: String,
    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Serialize)]
struct RunDocument<'a> {
    metadata: &'a RunMetadata,
    stored_at: DateTime<Utc>,
    #[serde(flatten)]
    results: &'a RunResults,
}

/// Metrics sink writing a JSON document on `store`
#[derive(Debug)]
pub struct JsonFileSink {
    path: PathBuf,
    metadata: RunMetadata,
    buffer: MemorySink,
}

impl JsonFileSink {
    /// Create a sink that will write to `path`
    pub fn new(path: impl Into<PathBuf>, metadata: RunMetadata) -> Self {
        Self {
            path: path.into(),
            metadata,
            buffer: MemorySink::new(),
        }
    }
}

#[async_trait]
impl MetricsSink for JsonFileSink {
    fn add_sample_point(
        &self,
        at: DateTime<Utc>,
        values: &[(&str, f64)],
    ) -> Result<(), SinkError> {
        self.buffer.add_sample_point(at, values)
    }

    fn add_error(&self, at: DateTime<Utc>, message: &str) -> Result<(), SinkError> {
        self.buffer.add_error(at, message)
    }

    fn add_run_aggregate(&self, name: &str, value: f64) -> Result<(), SinkError> {
        self.buffer.add_run_aggregate(name, value)
    }

    async fn store(&self) -> Result<String, SinkError> {
        let results = self.buffer.close()?;
        let document = RunDocument {
            metadata: &self.metadata,
            stored_at: Utc::now(),
            results: &results,
        };

        let bytes = serde_json::to_vec_pretty(&document)?;
        tokio::fs::write(&self.path, bytes).await?;

        Ok(format!("results written to {}", self.path.display()))
    }
}
