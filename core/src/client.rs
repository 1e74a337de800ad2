//! HTTP client for the aggregator's `RecordEvents` endpoint

use async_trait::async_trait;

use crate::error::{BenchError, BenchResult};
use crate::protocol::{HEALTH_PATH, RECORD_EVENTS_PATH};
use crate::record::{EventsRecordBatch, RecordReply};
use crate::traits::RecordPublisher;

/// Client submitting event records to an aggregator
#[derive(Debug, Clone)]
pub struct AggregatorClient {
    client: reqwest::Client,
    base_url: String,
}

impl AggregatorClient {
    /// Create a client without checking connectivity
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client and verify the aggregator answers its health check
    ///
    /// There is no retry: an aggregator that is not up when a reporter starts
    /// is a configuration error.
    pub async fn connect(base_url: impl Into<String>) -> BenchResult<Self> {
        let client = Self::new(base_url);
        let url = format!("{}{}", client.base_url, HEALTH_PATH);

        let response = client
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BenchError::transport(format!("aggregator unreachable at {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(BenchError::transport(format!(
                "aggregator health check at {url} returned {}",
                response.status()
            )));
        }

        tracing::debug!(url = %client.base_url, "Connected to aggregator");
        Ok(client)
    }

    /// Base URL of the aggregator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RecordPublisher for AggregatorClient {
    async fn publish(&self, batch: EventsRecordBatch) -> BenchResult<RecordReply> {
        let url = format!("{}{}", self.base_url, RECORD_EVENTS_PATH);
        let records = batch.items.len();
        let events = batch.event_count();

        let response = self.client.post(&url).json(&batch).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BenchError::transport(format!(
                "aggregator rejected batch with {status}: {body}"
            )));
        }

        let reply: RecordReply = response.json().await?;
        tracing::debug!(records, events, acknowledged = reply.count, "Events records published");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = AggregatorClient::new("http://localhost:10000/");
        assert_eq!(client.base_url(), "http://localhost:10000");
    }

    #[tokio::test]
    async fn test_connect_unreachable_is_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = AggregatorClient::connect(format!("http://{addr}")).await;
        assert!(matches!(result, Err(BenchError::Transport(_))));
    }
}
