//! Sender execution logic

use std::sync::Arc;
use std::time::Duration;

use crate::channel::ChannelConfig;
use crate::config::SenderConfig;
use crate::error::BenchResult;
use crate::pace::{PacePlan, PaceSpec};
use crate::pipeline::EventPipeline;
use crate::record::RecordReply;
use crate::traits::{LoadGenerator, RecordPublisher};

/// What a finished sender run produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderReport {
    /// Events recorded as sent
    pub sent: usize,
    /// Events recorded as accepted
    pub accepted: usize,
    /// Events recorded as failed
    pub failed: usize,
    /// Aggregator acknowledgement
    pub reply: RecordReply,
}

/// Sender running the pace plan against a load generator
pub struct Sender {
    pub(crate) config: SenderConfig,
    pub(crate) plan: PacePlan,
    pub(crate) load_generator: Arc<dyn LoadGenerator>,
    pub(crate) publisher: Arc<dyn RecordPublisher>,
    pub(crate) channel_config: ChannelConfig,
}

impl Sender {
    /// Get the configuration
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Get the pace plan
    pub fn plan(&self) -> &PacePlan {
        &self.plan
    }

    /// Run warmup, every phase, the end marker, then publish the records
    pub async fn run(&self) -> BenchResult<SenderReport> {
        let payload_size = self.config.payload_size;

        tracing::info!(
            source = %self.config.event_source,
            namespace = %self.config.namespace,
            plan = %self.plan,
            measured_secs = self.plan.total_duration().as_secs(),
            payload_size,
            "Starting sender"
        );

        if self.config.warmup_seconds > 0 {
            let pace = PaceSpec::new(
                self.config.warmup_rps,
                Duration::from_secs(self.config.warmup_seconds),
            )?;
            tracing::info!(rps = pace.rps, secs = self.config.warmup_seconds, "Warming up");
            self.load_generator.warmup(pace, payload_size).await?;

            tracing::info!(
                wait_secs = self.config.wait_after_warmup.as_secs_f64(),
                "Warmup finished, waiting for in-flight events"
            );
            tokio::time::sleep(self.config.wait_after_warmup).await;
        }

        let (pipeline, emitter) = EventPipeline::new(&self.channel_config);
        let drain = tokio::spawn(pipeline.drain());

        for (phase, pace) in self.plan.phases().iter().enumerate() {
            tracing::info!(
                phase,
                rps = pace.rps,
                secs = pace.duration.as_secs_f64(),
                "Starting pace"
            );
            self.load_generator
                .run_pace(phase, *pace, payload_size, &emitter)
                .await?;

            tracing::info!(phase, "Pace finished, waiting for in-flight events");
            tokio::time::sleep(self.config.wait_for_flush).await;

            // No collector to run here; the marker still tells receivers a phase ended
            tracing::info!(phase, "Triggering GC");
            self.load_generator.send_gc_event().await?;
            tokio::time::sleep(self.config.wait_for_receiver_gc).await;
        }

        tracing::info!("All paces done, sending end event");
        self.load_generator.send_end_event().await?;

        // Last emitter gone: the streams close and the drain task finishes
        drop(emitter);
        let records = drain.await?;

        let sent = records.sent.len();
        let accepted = records.accepted.len();
        let failed = records.failed.len();
        tracing::info!(sent, accepted, failed, "Publishing events records");

        let reply = self.publisher.publish(records.into_batch()).await?;
        tracing::info!(records = reply.count, "Events records published");

        Ok(SenderReport {
            sent,
            accepted,
            failed,
            reply,
        })
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("config", &self.config)
            .field("plan", &self.plan.to_string())
            .field("channel_config", &self.channel_config)
            .finish()
    }
}
