//! eventing-bench-core: load generation and latency measurement for event delivery
//!
//! This crate provides the pieces the `eventing-bench` processes are built from:
//!
//! - Pace plans and the event timestamp pipeline
//! - The Sender, which drives a load generator and reports what it sent
//! - The Receiver, which records when events arrive behind the system under test
//! - The Aggregator, which merges reports, computes statistics and stores them
//! - Core traits (LoadGenerator, RecordPublisher, MetricsSink)
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregator;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod loadgen;
pub mod pace;
pub mod pipeline;
pub mod protocol;
pub mod receiver;
pub mod record;
pub mod sender;
pub mod sink;
pub mod stats;
pub mod traits;

pub use aggregator::{Aggregator, AggregatorBuilder, AggregatorReport};
pub use channel::ChannelConfig;
pub use client::AggregatorClient;
pub use config::{AggregatorConfig, ConfigError, ReceiverConfig, SenderConfig};
pub use error::*;
pub use loadgen::HttpLoadGenerator;
pub use pace::{CapacityEstimate, PacePlan, PaceSpec, PaceSpecError};
pub use pipeline::{EventEmitter, EventPipeline, SenderRecords};
pub use receiver::Receiver;
pub use record::*;
pub use sender::{Sender, SenderBuilder, SenderReport};
pub use sink::{JsonFileSink, MemorySink, RunMetadata};
pub use stats::{RecordSnapshot, RunSummary, StatsEngine};
pub use traits::*;
