//! Pace plans: ordered phases of traffic at a fixed target rate
//!
//! A plan is written as comma-separated `RPS:SECONDS` phases, for example
//! `100:10,200:20` runs 100 events/s for ten seconds and then 200 events/s
//! for twenty seconds.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Seconds of traffic assumed to be in flight when sizing channels
const IN_FLIGHT_WINDOW_SECS: f64 = 5.0;

/// Headroom added on top of the expected event count
const TOTAL_EVENTS_HEADROOM: f64 = 0.1;

/// One phase of a benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaceSpec {
    /// Target events per second
    pub rps: f64,

    /// How long the phase lasts
    pub duration: Duration,
}

impl PaceSpec {
    /// Create a phase, rejecting non-positive rates and zero durations
    pub fn new(rps: f64, duration: Duration) -> Result<Self, PaceSpecError> {
        if !rps.is_finite() || rps <= 0.0 {
            return Err(PaceSpecError::InvalidRate(rps.to_string()));
        }
        if duration.is_zero() {
            return Err(PaceSpecError::InvalidDuration("0".into()));
        }
        Ok(Self { rps, duration })
    }

    /// Number of events this phase is expected to produce
    pub fn expected_events(&self) -> f64 {
        self.rps * self.duration.as_secs_f64()
    }
}

impl fmt::Display for PaceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rps, self.duration.as_secs())
    }
}

/// Capacity hints derived from a plan
///
/// Exceeding either number is never an error, it only costs a reallocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityEstimate {
    /// Upper bound on events in flight at once (pipeline buffering)
    pub in_flight: usize,

    /// Upper bound on events across the whole run (record maps)
    pub total_events: usize,
}

/// A validated, non-empty, ordered sequence of phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacePlan {
    phases: Vec<PaceSpec>,
}

impl PacePlan {
    /// Parse a plan from its textual form
    pub fn parse(text: &str) -> Result<Self, PaceSpecError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PaceSpecError::Empty);
        }

        let phases = text
            .split(',')
            .map(parse_phase)
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_phases(phases)
    }

    /// Build a plan from already constructed phases
    pub fn from_phases(phases: Vec<PaceSpec>) -> Result<Self, PaceSpecError> {
        if phases.is_empty() {
            return Err(PaceSpecError::Empty);
        }
        Ok(Self { phases })
    }

    /// Phases in execution order
    pub fn phases(&self) -> &[PaceSpec] {
        &self.phases
    }

    /// Number of phases
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Always false for a validated plan
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Sum of all phase durations
    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(|p| p.duration).sum()
    }

    /// Estimate buffer and map sizes for this plan
    pub fn capacity(&self) -> CapacityEstimate {
        let in_flight = self
            .phases
            .iter()
            .map(|p| (p.rps * IN_FLIGHT_WINDOW_SECS).ceil() as usize)
            .max()
            .unwrap_or(0);

        let expected: f64 = self.phases.iter().map(PaceSpec::expected_events).sum();
        let total_events = (expected * (1.0 + TOTAL_EVENTS_HEADROOM)).ceil() as usize;

        CapacityEstimate {
            in_flight: in_flight.max(1),
            total_events,
        }
    }
}

impl FromStr for PacePlan {
    type Err = PaceSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PacePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, phase) in self.phases.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{phase}")?;
        }
        Ok(())
    }
}

fn parse_phase(raw: &str) -> Result<PaceSpec, PaceSpecError> {
    let raw = raw.trim();
    let (rps, secs) = raw
        .split_once(':')
        .ok_or_else(|| PaceSpecError::Malformed(raw.to_string()))?;

    let rps: f64 = rps
        .trim()
        .parse()
        .map_err(|_| PaceSpecError::InvalidRate(rps.trim().to_string()))?;
    let secs: i64 = secs
        .trim()
        .parse()
        .map_err(|_| PaceSpecError::InvalidDuration(secs.trim().to_string()))?;

    if secs <= 0 {
        return Err(PaceSpecError::InvalidDuration(secs.to_string()));
    }

    PaceSpec::new(rps, Duration::from_secs(secs as u64))
}

/// Pace plan parse errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaceSpecError {
    /// No phases at all
    #[error("pace plan is empty")]
    Empty,

    /// A phase is not of the form `RPS:SECONDS`
    #[error("malformed phase {0:?}, expected RPS:SECONDS")]
    Malformed(String),

    /// Rate missing, not a number, or not positive
    #[error("invalid rate {0:?}, must be a positive number")]
    InvalidRate(String),

    /// Duration missing, not an integer, or not positive
    #[error("invalid duration {0:?}, must be a positive number of seconds")]
    InvalidDuration(String),
}
