//! Event pacing via the governor token bucket

use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};

/// Releases one event every `1 / rps` seconds
///
/// The bucket holds a single token so events are spread evenly over the
/// phase instead of being released in per-second bursts. Fractional rates
/// such as 0.5 rps are honored.
pub struct EventPacer {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    rps: f64,
}

impl EventPacer {
    /// Create a pacer, or `None` if the rate is not a positive finite number
    ///
    /// # Examples
    /// ```
    /// use eventing_bench_core::loadgen::EventPacer;
    ///
    /// assert!(EventPacer::new(100.0).is_some());
    /// assert!(EventPacer::new(0.0).is_none());
    /// ```
    pub fn new(rps: f64) -> Option<Self> {
        if !rps.is_finite() || rps <= 0.0 {
            return None;
        }
        let period = Duration::try_from_secs_f64(1.0 / rps).ok()?;
        let quota = Quota::with_period(period)?;
        Some(Self {
            limiter: RateLimiter::direct(quota),
            rps,
        })
    }

    /// Wait until the next event may be released
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Configured rate
    pub fn rps(&self) -> f64 {
        self.rps
    }
}

impl std::fmt::Debug for EventPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPacer").field("rps", &self.rps).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacer_rejects_bad_rates() {
        assert!(EventPacer::new(0.0).is_none());
        assert!(EventPacer::new(-10.0).is_none());
        assert!(EventPacer::new(f64::NAN).is_none());
        assert!(EventPacer::new(f64::INFINITY).is_none());
    }

    #[tokio::test]
    async fn test_pacer_single_token_burst() {
        let pacer = EventPacer::new(10.0).unwrap();
        pacer.wait().await;
        let start = std::time::Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_pacer_fractional_rate() {
        let pacer = EventPacer::new(0.5).unwrap();
        assert_eq!(pacer.rps(), 0.5);
        // First slot is free even at very low rates
        tokio::time::timeout(Duration::from_millis(100), pacer.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pacer_spreads_events() {
        let pacer = EventPacer::new(100.0).unwrap();
        let start = std::time::Instant::now();
        for _ in 0..11 {
            pacer.wait().await;
        }
        // First event is free, the next ten take ~10ms each
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_pacer_debug() {
        let pacer = EventPacer::new(100.0).unwrap();
        assert!(format!("{pacer:?}").contains("100.0"));
    }
}
