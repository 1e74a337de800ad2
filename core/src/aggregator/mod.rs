//! Aggregator collecting event records from senders and receivers
//!
//! The Aggregator:
//! - Serves `RecordEvents` over HTTP and merges every batch into four
//!   per-class buckets, first writer wins
//! - Counts merged batches and stops serving once the expected number arrived
//! - Runs the statistics engine over the merged records and stores the results
//!
//! # Example
//!
//! ```ignore
//! use eventing_bench_core::{AggregatorBuilder, MemorySink};
//!
//! let aggregator = AggregatorBuilder::new()
//!     .listen_addr("0.0.0.0:10000".parse()?)
//!     .expected_batches(2)
//!     .sink(Arc::new(MemorySink::new()))
//!     .build()
//!     .await?;
//!
//! let report = aggregator.run_with_signal_handling(None).await?;
//! ```

mod builder;
mod executor;
mod service;
mod state;

pub use builder::AggregatorBuilder;
pub use executor::{Aggregator, AggregatorReport, ShutdownHook};
pub use state::{AggregatedState, BatchCounter, RecordStore};
