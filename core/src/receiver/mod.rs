//! Receiver standing behind the system under test
//!
//! Accepts binary-mode CloudEvents on `POST /` and records when each measured
//! event arrived. The `gc` marker is logged as a phase boundary; the `end`
//! marker stops the server, after which the RECEIVED record is published to
//! the aggregator as one batch.

mod executor;
mod service;

pub use executor::Receiver;
