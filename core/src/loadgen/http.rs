//! CloudEvents-over-HTTP load generator

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::error::{BenchError, BenchResult};
use crate::pace::PaceSpec;
use crate::pipeline::EventEmitter;
use crate::protocol::{
    CE_ID, CE_SOURCE, CE_SPECVERSION, CE_TYPE, END_EVENT_TYPE, GC_EVENT_TYPE, MEASURED_EVENT_TYPE,
    SPEC_VERSION,
};
use crate::traits::LoadGenerator;

use super::pacer::EventPacer;

/// Outcome counts of one paced run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriveStats {
    /// Events sent
    pub sent: u64,
    /// Events answered with a 2xx status
    pub accepted: u64,
    /// Events rejected or lost in transport
    pub failed: u64,
}

impl DriveStats {
    fn tally(&mut self, accepted: bool) {
        if accepted {
            self.accepted += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Load generator POSTing binary-mode CloudEvents to a target URL
///
/// Event ids are `{source}-{phase}-{sequence}`; warmup events use the phase
/// label `warmup` and are not recorded.
#[derive(Debug, Clone)]
pub struct HttpLoadGenerator {
    client: reqwest::Client,
    target: String,
    source: String,
    markers: Arc<AtomicU64>,
}

impl HttpLoadGenerator {
    /// Create a generator sending to `target` as `source`
    pub fn new(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            target: target.into(),
            source: source.into(),
            markers: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Target URL
    pub fn target(&self) -> &str {
        &self.target
    }

    fn event_request(&self, id: &str, event_type: &str, body: Vec<u8>) -> reqwest::RequestBuilder {
        self.client
            .post(&self.target)
            .header(CE_ID, id)
            .header(CE_TYPE, event_type)
            .header(CE_SOURCE, &self.source)
            .header(CE_SPECVERSION, SPEC_VERSION)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
    }

    /// Send events at `pace.rps` for `pace.duration`, then wait for all responses
    async fn drive(
        &self,
        label: &str,
        pace: PaceSpec,
        payload_size: usize,
        emitter: Option<&EventEmitter>,
    ) -> BenchResult<DriveStats> {
        let pacer = EventPacer::new(pace.rps)
            .ok_or_else(|| BenchError::load_generator(format!("invalid rate {}", pace.rps)))?;
        let payload = vec![b'x'; payload_size];
        let deadline = Instant::now() + pace.duration;

        let mut tasks = JoinSet::new();
        let mut stats = DriveStats::default();

        loop {
            pacer.wait().await;
            if Instant::now() >= deadline {
                break;
            }

            let id = format!("{}-{}-{}", self.source, label, stats.sent);
            stats.sent += 1;

            let request = self.event_request(&id, MEASURED_EVENT_TYPE, payload.clone());
            let emitter = emitter.cloned();
            tasks.spawn(async move {
                // Emitting may wait on a full channel, so stamp first and
                // report both timestamps once the response is in
                let sent_at = Utc::now();
                let accepted = match request.send().await {
                    Ok(response) if response.status().is_success() => true,
                    Ok(response) => {
                        tracing::debug!(event_id = %id, status = %response.status(), "Event rejected");
                        false
                    }
                    Err(e) => {
                        tracing::debug!(event_id = %id, error = %e, "Event send failed");
                        false
                    }
                };
                let done_at = Utc::now();

                if let Some(emitter) = &emitter {
                    emitter.sent(id.clone(), sent_at).await;
                    if accepted {
                        emitter.accepted(id, done_at).await;
                    } else {
                        emitter.failed(id, done_at).await;
                    }
                }
                accepted
            });

            while let Some(done) = tasks.try_join_next() {
                stats.tally(done?);
            }
        }

        while let Some(done) = tasks.join_next().await {
            stats.tally(done?);
        }

        Ok(stats)
    }

    async fn send_marker(&self, event_type: &str) -> BenchResult<()> {
        let n = self.markers.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}-{}-{}", self.source, event_type, n);

        let response = self.event_request(&id, event_type, Vec::new()).send().await?;
        if !response.status().is_success() {
            return Err(BenchError::load_generator(format!(
                "{event_type} marker rejected with {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LoadGenerator for HttpLoadGenerator {
    async fn warmup(&self, pace: PaceSpec, payload_size: usize) -> BenchResult<()> {
        let stats = self.drive("warmup", pace, payload_size, None).await?;
        tracing::info!(sent = stats.sent, failed = stats.failed, "Warmup traffic done");
        Ok(())
    }

    async fn run_pace(
        &self,
        phase: usize,
        pace: PaceSpec,
        payload_size: usize,
        emitter: &EventEmitter,
    ) -> BenchResult<()> {
        let stats = self
            .drive(&phase.to_string(), pace, payload_size, Some(emitter))
            .await?;
        tracing::info!(
            phase,
            sent = stats.sent,
            accepted = stats.accepted,
            failed = stats.failed,
            "Pace traffic done"
        );
        Ok(())
    }

    async fn send_gc_event(&self) -> BenchResult<()> {
        // Receivers only log the boundary, so losing the marker is not fatal
        if let Err(e) = self.send_marker(GC_EVENT_TYPE).await {
            tracing::warn!(error = %e, "Failed to send GC marker");
        }
        Ok(())
    }

    async fn send_end_event(&self) -> BenchResult<()> {
        self.send_marker(END_EVENT_TYPE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;
    use crate::pipeline::EventPipeline;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use parking_lot::Mutex;
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<(String, String)>>>;

    /// Target that records `(ce-id, ce-type)` and rejects every third event
    async fn spawn_target() -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route(
            "/",
            post({
                let seen = Arc::clone(&seen);
                move |headers: HeaderMap| {
                    let seen = Arc::clone(&seen);
                    async move {
                        let header = |name: &str| {
                            headers
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default()
                                .to_string()
                        };
                        let mut seen = seen.lock();
                        seen.push((header(CE_ID), header(CE_TYPE)));
                        if seen.len() % 3 == 0 {
                            StatusCode::SERVICE_UNAVAILABLE
                        } else {
                            StatusCode::ACCEPTED
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        (format!("http://{addr}/"), seen)
    }

    #[tokio::test]
    async fn test_run_pace_records_every_event() {
        let (target, seen) = spawn_target().await;
        let generator = HttpLoadGenerator::new(target, "sender-0");

        let (pipeline, emitter) = EventPipeline::new(&ChannelConfig::default());
        let drain = tokio::spawn(pipeline.drain());

        let pace = PaceSpec::new(50.0, Duration::from_millis(400)).unwrap();
        generator.run_pace(0, pace, 16, &emitter).await.unwrap();
        drop(emitter);
        let records = drain.await.unwrap();

        let seen = seen.lock().clone();
        assert!(!seen.is_empty());
        assert_eq!(records.sent.len(), seen.len());
        assert_eq!(records.accepted.len() + records.failed.len(), seen.len());
        assert_eq!(records.failed.len(), seen.len() / 3);
        assert!(records.sent.contains("sender-0-0-0"));
        assert!(seen.iter().all(|(_, t)| t == MEASURED_EVENT_TYPE));
    }

    #[tokio::test]
    async fn test_backpressure_does_not_inflate_send_latency() {
        let (target, _seen) = spawn_target().await;
        let generator = HttpLoadGenerator::new(target, "sender-0");

        // One-slot channels drained late: emitting blocks for ~300ms
        let (pipeline, emitter) =
            EventPipeline::new(&ChannelConfig::default().with_events_buffer(1));
        let pace = PaceSpec::new(50.0, Duration::from_millis(200)).unwrap();
        let run = async move {
            let result = generator.run_pace(0, pace, 8, &emitter).await;
            drop(emitter);
            result
        };
        let drain = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            pipeline.drain().await
        };
        let (result, records) = tokio::join!(run, drain);
        result.unwrap();

        assert!(records.sent.len() > 2);
        for (id, sent_at) in &records.sent.events {
            let outcome = records
                .accepted
                .get(id)
                .or_else(|| records.failed.get(id))
                .unwrap();
            let latency = outcome - *sent_at;
            assert!(latency >= chrono::Duration::zero());
            assert!(latency < chrono::Duration::milliseconds(200), "{id}: {latency}");
        }
    }

    #[tokio::test]
    async fn test_unreachable_target_marks_failed() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let generator = HttpLoadGenerator::new(format!("http://{addr}/"), "sender-0");

        let (pipeline, emitter) = EventPipeline::new(&ChannelConfig::default());
        let drain = tokio::spawn(pipeline.drain());

        let pace = PaceSpec::new(20.0, Duration::from_millis(200)).unwrap();
        generator.run_pace(1, pace, 8, &emitter).await.unwrap();
        drop(emitter);
        let records = drain.await.unwrap();

        assert!(!records.sent.is_empty());
        assert!(records.accepted.is_empty());
        assert_eq!(records.failed.len(), records.sent.len());
    }

    #[tokio::test]
    async fn test_markers_carry_types() {
        let (target, seen) = spawn_target().await;
        let generator = HttpLoadGenerator::new(target, "sender-0");

        generator.send_gc_event().await.unwrap();
        generator.send_end_event().await.unwrap();

        let seen = seen.lock().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, GC_EVENT_TYPE);
        assert_eq!(seen[1].1, END_EVENT_TYPE);
        assert_ne!(seen[0].0, seen[1].0);
    }

    #[tokio::test]
    async fn test_end_marker_to_unreachable_target_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let generator = HttpLoadGenerator::new(format!("http://{addr}/"), "sender-0");

        // GC marker loss is tolerated, end marker loss is not
        assert!(generator.send_gc_event().await.is_ok());
        assert!(generator.send_end_event().await.is_err());
    }
}
