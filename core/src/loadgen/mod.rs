//! Concrete load generators
//!
//! [`HttpLoadGenerator`] sends binary-mode CloudEvents to an HTTP target,
//! paced by an [`EventPacer`].

mod http;
mod pacer;

pub use http::{DriveStats, HttpLoadGenerator};
pub use pacer::EventPacer;
