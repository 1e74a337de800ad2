//! Configuration for the sender, aggregator and receiver processes

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default event source when `POD_NAME` is unset
pub const DEFAULT_EVENT_SOURCE: &str = "perf-test-event-source";

/// Default namespace when `POD_NAMESPACE` is unset
pub const DEFAULT_NAMESPACE: &str = "default";

/// Environment variable naming this process
pub const POD_NAME_ENV: &str = "POD_NAME";

/// Environment variable naming the namespace of the run
pub const POD_NAMESPACE_ENV: &str = "POD_NAMESPACE";

/// Fixed warmup rate (events per second)
pub const WARMUP_RPS: f64 = 100.0;

/// Default inbound RPC body limit (100 MiB)
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

/// Event source for this process: `POD_NAME` or the default
pub fn event_source_from_env() -> String {
    non_empty_env(POD_NAME_ENV).unwrap_or_else(|| DEFAULT_EVENT_SOURCE.to_string())
}

/// Namespace for this run: `POD_NAMESPACE` or the default
pub fn namespace_from_env() -> String {
    non_empty_env(POD_NAMESPACE_ENV).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Sender configuration
///
/// Pause durations default to the values the harness has always used; they
/// assume end-to-end latency stays well under a second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Source identity stamped on generated events
    pub event_source: String,

    /// Namespace the run belongs to
    pub namespace: String,

    /// Payload size of each generated event in bytes
    pub payload_size: usize,

    /// Warmup length in seconds (0 skips warmup)
    pub warmup_seconds: u64,

    /// Rate used during warmup
    pub warmup_rps: f64,

    /// Pause after warmup so in-flight warmup events settle
    pub wait_after_warmup: Duration,

    /// Pause after each phase so in-flight events are flushed
    pub wait_for_flush: Duration,

    /// Pause after the GC marker so receivers can clean up
    pub wait_for_receiver_gc: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            event_source: DEFAULT_EVENT_SOURCE.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            payload_size: 100,
            warmup_seconds: 10,
            warmup_rps: WARMUP_RPS,
            wait_after_warmup: Duration::from_secs(5),
            wait_for_flush: Duration::from_secs(5),
            wait_for_receiver_gc: Duration::from_secs(3),
        }
    }
}

impl SenderConfig {
    /// Create a config with identity taken from the environment
    pub fn from_env() -> Self {
        Self {
            event_source: event_source_from_env(),
            namespace: namespace_from_env(),
            ..Default::default()
        }
    }

    /// Set the event source
    pub fn with_event_source(mut self, source: impl Into<String>) -> Self {
        self.event_source = source.into();
        self
    }

    /// Set the payload size
    pub fn with_payload_size(mut self, size: usize) -> Self {
        self.payload_size = size;
        self
    }

    /// Set the warmup length in seconds
    pub fn with_warmup_seconds(mut self, seconds: u64) -> Self {
        self.warmup_seconds = seconds;
        self
    }

    /// Set all three pauses at once
    pub fn with_pauses(mut self, after_warmup: Duration, flush: Duration, receiver_gc: Duration) -> Self {
        self.wait_after_warmup = after_warmup;
        self.wait_for_flush = flush;
        self.wait_for_receiver_gc = receiver_gc;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_source.is_empty() {
            return Err(ConfigError::InvalidEventSource(
                "event source must not be empty".into(),
            ));
        }
        if !self.warmup_rps.is_finite() || self.warmup_rps <= 0.0 {
            return Err(ConfigError::InvalidRate(
                "warmup rate must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Address the RPC listener binds to
    pub listen_addr: SocketAddr,

    /// Number of `RecordEvents` calls to wait for
    pub expected_batches: usize,

    /// Largest accepted request body
    pub max_message_bytes: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 10000)),
            expected_batches: 2,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl AggregatorConfig {
    /// Create a config for the given listen address
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    /// Set the expected number of batches
    pub fn with_expected_batches(mut self, expected: usize) -> Self {
        self.expected_batches = expected;
        self
    }

    /// Set the inbound body limit
    pub fn with_max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expected_batches == 0 {
            return Err(ConfigError::InvalidExpectedBatches(
                "expected batch count must be at least 1".into(),
            ));
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::InvalidMessageSize(
                "max message size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Address the event listener binds to
    pub listen_addr: SocketAddr,

    /// Buffer of the received-events channel
    pub events_buffer: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            events_buffer: 10_000,
        }
    }
}

impl ReceiverConfig {
    /// Create a config for the given listen address
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events_buffer == 0 {
            return Err(ConfigError::InvalidMessageSize(
                "events buffer must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid event source
    #[error("Invalid event source: {0}")]
    InvalidEventSource(String),

    /// Invalid rate
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// Invalid expected batch count
    #[error("Invalid expected batch count: {0}")]
    InvalidExpectedBatches(String),

    /// Invalid message or buffer size
    #[error("Invalid size: {0}")]
    InvalidMessageSize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sender_config() {
        let config = SenderConfig::default();
        assert_eq!(config.event_source, DEFAULT_EVENT_SOURCE);
        assert_eq!(config.warmup_rps, 100.0);
        assert_eq!(config.wait_after_warmup, Duration::from_secs(5));
        assert_eq!(config.wait_for_flush, Duration::from_secs(5));
        assert_eq!(config.wait_for_receiver_gc, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sender_config_builder_pattern() {
        let config = SenderConfig::default()
            .with_event_source("sender-0")
            .with_payload_size(512)
            .with_warmup_seconds(0)
            .with_pauses(Duration::ZERO, Duration::ZERO, Duration::ZERO);

        assert_eq!(config.event_source, "sender-0");
        assert_eq!(config.payload_size, 512);
        assert_eq!(config.warmup_seconds, 0);
        assert_eq!(config.wait_for_flush, Duration::ZERO);
    }

    #[test]
    fn test_sender_config_empty_source() {
        let config = SenderConfig::default().with_event_source("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_aggregator_config_validation() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        assert!(AggregatorConfig::new(addr).validate().is_ok());
        assert!(AggregatorConfig::new(addr)
            .with_expected_batches(0)
            .validate()
            .is_err());
        assert!(AggregatorConfig::new(addr)
            .with_max_message_bytes(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_aggregator_default_message_limit() {
        let config = AggregatorConfig::default();
        assert_eq!(config.max_message_bytes, 104_857_600);
    }

    #[test]
    fn test_config_serialization() {
        let config = SenderConfig::default().with_payload_size(2048);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SenderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.payload_size, 2048);
    }
}
