//! Error types for eventing-bench-core

use thiserror::Error;

use crate::config::ConfigError;
use crate::pace::PaceSpecError;
use crate::traits::SinkError;

/// Core error type
///
/// Every variant is fatal for the process that owns it. Recoverable
/// conditions (duplicate ids, correlation gaps, single sink writes) are
/// logged where they happen and never surface as a `BenchError`.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed pace plan
    #[error("invalid pace spec: {0}")]
    PaceSpec(#[from] PaceSpecError),

    /// Load generator failure
    #[error("load generator error: {0}")]
    LoadGenerator(String),

    /// RPC transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Server failure (listener or serve loop)
    #[error("server error: {0}")]
    Server(String),

    /// Metrics sink failure
    #[error("metrics sink error: {0}")]
    Sink(#[from] SinkError),

    /// Background task panicked or was aborted
    #[error("task error: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an error for a required builder field that was not set
    pub fn missing_config(field: &str) -> Self {
        Self::Config(format!("missing required field: {field}"))
    }

    /// Create a load generator error
    pub fn load_generator(message: impl Into<String>) -> Self {
        Self::LoadGenerator(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a server error
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }
}

impl From<ConfigError> for BenchError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<tokio::task::JoinError> for BenchError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
