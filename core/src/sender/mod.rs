//! Sender orchestrating one benchmark run
//!
//! The Sender drives a [`LoadGenerator`](crate::traits::LoadGenerator)
//! through the pace plan and ships what it observed to the aggregator:
//!
//! 1. Optional warmup at a fixed rate, then a pause for in-flight events
//! 2. Start the timestamp drain task
//! 3. For each phase: run it, pause to flush, send the GC marker, pause
//! 4. Send the end marker
//! 5. Close the timestamp streams and wait for the drain task
//! 6. Publish SENT, ACCEPTED and FAILED as one batch
//!
//! Any failure along the way ends the run with an error.
//!
//! # Example
//!
//! ```ignore
//! use eventing_bench_core::{PacePlan, SenderBuilder};
//!
//! let sender = SenderBuilder::new()
//!     .plan(PacePlan::parse("100:10,200:20")?)
//!     .load_generator(generator)
//!     .publisher(Arc::new(AggregatorClient::connect(url).await?))
//!     .build()?;
//!
//! let report = sender.run().await?;
//! ```

mod builder;
mod executor;

pub use builder::SenderBuilder;
pub use executor::{Sender, SenderReport};
