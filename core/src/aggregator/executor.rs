//! Aggregator execution logic

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::AggregatorConfig;
use crate::error::{BenchError, BenchResult};
use crate::stats::{RunSummary, StatsEngine};
use crate::traits::MetricsSink;

use super::service::{self, ServiceState};
use super::state::{AggregatedState, BatchCounter, RecordStore};

/// Hook run once before the aggregator returns a fatal error
pub type ShutdownHook = Box<dyn FnOnce() + Send>;

/// What a finished aggregator run produced
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorReport {
    /// Statistics computed over the merged records
    pub summary: RunSummary,
    /// `RecordEvents` calls merged before the server stopped
    pub batches: usize,
    /// Whether all expected batches arrived
    pub complete: bool,
    /// Description of where the sink stored results
    pub output: String,
}

/// Aggregator collecting event records and computing statistics
///
/// The listener is already bound; use `AggregatorBuilder` to construct one.
pub struct Aggregator {
    pub(crate) config: AggregatorConfig,
    pub(crate) listener: TcpListener,
    pub(crate) state: Arc<AggregatedState>,
    pub(crate) counter: Arc<BatchCounter>,
    pub(crate) sink: Arc<dyn MetricsSink>,
    pub(crate) shutdown_hook: Option<ShutdownHook>,
}

impl Aggregator {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> BenchResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get the configuration
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Serve until the expected batch count is reached, then publish statistics
    ///
    /// Cancelling `cancel` first stops the server early and statistics are
    /// computed over whatever was merged. A server failure or a failed
    /// `store` is fatal and runs the shutdown hook.
    pub async fn run(self, cancel: CancellationToken) -> BenchResult<AggregatorReport> {
        let Self {
            config,
            listener,
            state,
            counter,
            sink,
            mut shutdown_hook,
        } = self;

        let app = service::router(
            ServiceState {
                store: Arc::clone(&state) as Arc<dyn RecordStore>,
                counter: Arc::clone(&counter),
            },
            config.max_message_bytes,
        );

        let stop = CancellationToken::new();
        let mut server = {
            let stop = stop.clone();
            tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { stop.cancelled().await })
                    .await
            })
        };

        let expected = config.expected_batches;
        let complete = tokio::select! {
            _ = counter.wait_for(expected) => true,
            _ = cancel.cancelled() => false,
            result = &mut server => {
                let err = match result {
                    Ok(Ok(())) => BenchError::server("server stopped before all batches arrived"),
                    Ok(Err(e)) => BenchError::server(e.to_string()),
                    Err(e) => e.into(),
                };
                return Err(Self::fatal(&mut shutdown_hook, err));
            }
        };

        // In-flight calls finish, new connections are refused
        stop.cancel();
        match server.await {
            Ok(Ok(())) => tracing::debug!("Aggregator server stopped"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Aggregator server failed while stopping"),
            Err(e) => tracing::warn!(error = %e, "Aggregator server task failed while stopping"),
        }

        let batches = counter.received();
        if complete {
            tracing::info!(batches, "All expected batches received");
        } else {
            tracing::warn!(
                batches,
                expected,
                "Cancelled before all batches arrived, computing statistics over partial data"
            );
        }

        let snapshot = state.snapshot_all();
        let summary = StatsEngine::new().publish(&snapshot, sink.as_ref());

        tracing::info!(
            sent = summary.sent,
            accepted = summary.accepted,
            failed = summary.failed,
            received = summary.received,
            publish_errors = summary.publish_errors,
            delivery_errors = summary.delivery_errors,
            send_p50_ms = summary.send_latency.p50,
            send_p99_ms = summary.send_latency.p99,
            e2e_p50_ms = summary.e2e_latency.p50,
            e2e_p99_ms = summary.e2e_latency.p99,
            "Run summary"
        );

        let output = match sink.store().await {
            Ok(output) => output,
            Err(e) => return Err(Self::fatal(&mut shutdown_hook, e.into())),
        };
        tracing::info!(%output, "Results stored");

        Ok(AggregatorReport {
            summary,
            batches,
            complete,
            output,
        })
    }

    /// Run with Ctrl+C handling and an optional deadline
    ///
    /// Either one cancels the run; statistics are still computed.
    pub async fn run_with_signal_handling(
        self,
        timeout: Option<Duration>,
    ) -> BenchResult<AggregatorReport> {
        let cancel = CancellationToken::new();

        let signal_handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Received Ctrl+C, stopping aggregator...");
                        cancel.cancel();
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    }
                }
            })
        };

        let timeout_handle = timeout.map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::info!(timeout_secs = timeout.as_secs_f64(), "Timeout reached, stopping aggregator...");
                cancel.cancel();
            })
        });

        let result = self.run(cancel).await;

        signal_handle.abort();
        if let Some(handle) = timeout_handle {
            handle.abort();
        }

        result
    }

    fn fatal(hook: &mut Option<ShutdownHook>, err: BenchError) -> BenchError {
        tracing::error!(error = %err, "Aggregator failed");
        if let Some(hook) = hook.take() {
            hook();
        }
        err
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("config", &self.config)
            .field("listener", &self.listener.local_addr().ok())
            .field("batches", &self.counter.received())
            .field("shutdown_hook", &self.shutdown_hook.is_some())
            .finish()
    }
}
