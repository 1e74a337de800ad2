//! Receiver execution logic

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ReceiverConfig;
use crate::error::{BenchError, BenchResult};
use crate::record::{EventTimestamp, EventsRecord, EventsRecordBatch, RecordClass, RecordReply};
use crate::traits::RecordPublisher;

use super::service::{self, ServiceState};

/// Receiver recording when delivered events arrive
pub struct Receiver {
    config: ReceiverConfig,
    listener: TcpListener,
    publisher: Arc<dyn RecordPublisher>,
}

impl Receiver {
    /// Validate the configuration and bind the listener
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails or the listen
    /// address cannot be bound.
    pub async fn bind(config: ReceiverConfig, publisher: Arc<dyn RecordPublisher>) -> BenchResult<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|e| BenchError::config(format!("failed to bind {}: {e}", config.listen_addr)))?;

        tracing::info!(addr = %config.listen_addr, "Receiver listening");
        Ok(Self {
            config,
            listener,
            publisher,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> BenchResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the end marker arrives or `cancel` fires, then publish
    /// the RECEIVED record as one batch
    pub async fn run(self, cancel: CancellationToken) -> BenchResult<RecordReply> {
        let (tx, rx) = mpsc::channel(self.config.events_buffer);
        let drain = tokio::spawn(Self::drain(rx));

        let end = CancellationToken::new();
        let app = service::router(ServiceState {
            received: tx,
            end: end.clone(),
        });

        let stop = async move {
            tokio::select! {
                _ = end.cancelled() => {}
                _ = cancel.cancelled() => {
                    tracing::warn!("Receiver cancelled before the end marker, publishing what it has");
                }
            }
        };

        // Serving owns the only stream sender; once it returns the drain ends
        axum::serve(self.listener, app)
            .with_graceful_shutdown(stop)
            .await
            .map_err(|e| BenchError::server(e.to_string()))?;

        let record = drain.await?;
        tracing::info!(received = record.len(), "Publishing received events");

        self.publisher
            .publish(EventsRecordBatch::new(vec![record]))
            .await
    }

    async fn drain(mut rx: mpsc::Receiver<EventTimestamp>) -> EventsRecord {
        let mut record = EventsRecord::new(RecordClass::Received);
        while let Some(e) = rx.recv().await {
            if !record.insert_first(e.event_id, e.at) {
                tracing::debug!("Ignoring repeated delivery of event");
            }
        }
        record
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("config", &self.config)
            .field("listener", &self.listener.local_addr().ok())
            .finish()
    }
}
