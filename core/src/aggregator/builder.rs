//! Builder pattern for Aggregator construction

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::AggregatorConfig;
use crate::error::{BenchError, BenchResult};
use crate::traits::MetricsSink;

use super::executor::{Aggregator, ShutdownHook};
use super::state::{AggregatedState, BatchCounter};

/// Builder for creating an Aggregator
///
/// # Example
///
/// ```ignore
/// let aggregator = AggregatorBuilder::new()
///     .listen_addr("0.0.0.0:10000".parse()?)
///     .expected_batches(2)
///     .sink(Arc::new(MemorySink::new()))
///     .build()
///     .await?;
///
/// let report = aggregator.run(CancellationToken::new()).await?;
/// ```
pub struct AggregatorBuilder {
    config: AggregatorConfig,
    sink: Option<Arc<dyn MetricsSink>>,
    shutdown_hook: Option<ShutdownHook>,
    record_capacity: usize,
}

impl AggregatorBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self {
            config: AggregatorConfig::default(),
            sink: None,
            shutdown_hook: None,
            record_capacity: 0,
        }
    }

    /// Set the full configuration
    pub fn config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the listen address
    pub fn listen_addr(mut self, addr: std::net::SocketAddr) -> Self {
        self.config.listen_addr = addr;
        self
    }

    /// Set how many `RecordEvents` calls to wait for
    pub fn expected_batches(mut self, expected: usize) -> Self {
        self.config.expected_batches = expected;
        self
    }

    /// Set the metrics sink
    pub fn sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set a hook run once before a fatal error is returned
    pub fn shutdown_hook<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.shutdown_hook = Some(Box::new(hook));
        self
    }

    /// Pre-size each record bucket
    pub fn record_capacity(mut self, capacity: usize) -> Self {
        self.record_capacity = capacity;
        self
    }

    /// Validate the configuration and bind the listener
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the sink is missing, validation
    /// fails, or the listen address cannot be bound.
    pub async fn build(self) -> BenchResult<Aggregator> {
        let sink = self.sink.ok_or_else(|| BenchError::missing_config("sink"))?;
        self.config.validate()?;

        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(|e| {
                BenchError::config(format!("failed to bind {}: {e}", self.config.listen_addr))
            })?;

        tracing::info!(
            addr = %self.config.listen_addr,
            expected_batches = self.config.expected_batches,
            "Aggregator listening"
        );

        Ok(Aggregator {
            config: self.config,
            listener,
            state: Arc::new(AggregatedState::with_capacity(self.record_capacity)),
            counter: Arc::new(BatchCounter::new()),
            sink,
            shutdown_hook: self.shutdown_hook,
        })
    }
}

impl Default for AggregatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
