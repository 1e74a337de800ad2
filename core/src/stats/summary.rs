//! Run summary and latency percentile calculation

use serde::{Deserialize, Serialize};

/// Above this many samples percentiles come from the HDR histogram
/// instead of a full sort
pub const EXACT_PERCENTILE_LIMIT: usize = 100_000;

/// Latency percentiles (all values in milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LatencyPercentiles {
    /// Number of samples
    pub count: usize,
    /// Minimum value
    pub min: f64,
    /// 50th percentile (median)
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 99th percentile
    pub p99: f64,
    /// Maximum value
    pub max: f64,
    /// Mean value
    pub mean: f64,
    /// Standard deviation
    pub stddev: f64,
}

impl LatencyPercentiles {
    /// Exact summary of `values`, already in milliseconds
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);

        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Self::default();
        };

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        // Sample standard deviation; a single value has none
        let stddev = if sorted.len() > 1 {
            let squares: f64 = sorted.iter().map(|v| (v - mean) * (v - mean)).sum();
            (squares / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Self {
            count: sorted.len(),
            min,
            p50: percentile(&sorted, 0.50),
            p90: percentile(&sorted, 0.90),
            p99: percentile(&sorted, 0.99),
            max,
            mean,
            stddev,
        }
    }

    /// Summarize latencies given in seconds
    ///
    /// Small sample sets are sorted exactly; large ones go through a
    /// [`LatencyHistogram`]. Negative values (sender and receiver clocks
    /// disagree) are kept by the exact path and clamped to zero by the
    /// histogram.
    pub fn from_seconds(values: &[f64]) -> Self {
        if values.len() > EXACT_PERCENTILE_LIMIT {
            match LatencyHistogram::new() {
                Ok(mut histogram) => {
                    for v in values {
                        histogram.record_secs(*v);
                    }
                    return histogram.percentiles();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create latency histogram, sorting instead");
                }
            }
        }

        let millis: Vec<f64> = values.iter().map(|v| v * 1000.0).collect();
        Self::from_values(&millis)
    }
}

/// Linear interpolation between the two ranks around `p`
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };

    let rank = p.clamp(0.0, 1.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(last);
    let weight = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// HDR histogram of latencies with microsecond precision, up to one hour
pub struct LatencyHistogram {
    histogram: hdrhistogram::Histogram<u64>,
}

impl std::fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("len", &self.histogram.len())
            .finish()
    }
}

impl LatencyHistogram {
    /// Create a new histogram
    pub fn new() -> Result<Self, hdrhistogram::CreationError> {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 3_600_000_000, 3)?;
        Ok(Self { histogram })
    }

    /// Record a value in seconds; negative values count as zero
    pub fn record_secs(&mut self, secs: f64) {
        self.record_micros((secs.max(0.0) * 1_000_000.0) as u64);
    }

    fn record_micros(&mut self, micros: u64) {
        // Out-of-range values saturate rather than being dropped
        self.histogram.saturating_record(micros);
    }

    /// Number of recorded values
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Percentiles in milliseconds
    pub fn percentiles(&self) -> LatencyPercentiles {
        if self.histogram.is_empty() {
            return LatencyPercentiles::default();
        }

        let ms = |micros: u64| micros as f64 / 1000.0;
        LatencyPercentiles {
            count: self.histogram.len() as usize,
            min: ms(self.histogram.min()),
            p50: ms(self.histogram.value_at_quantile(0.50)),
            p90: ms(self.histogram.value_at_quantile(0.90)),
            p99: ms(self.histogram.value_at_quantile(0.99)),
            max: ms(self.histogram.max()),
            mean: self.histogram.mean() / 1000.0,
            stddev: self.histogram.stdev() / 1000.0,
        }
    }
}

/// Outcome of one statistics pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Events in SENT
    pub sent: usize,
    /// Events in ACCEPTED
    pub accepted: usize,
    /// Events in FAILED
    pub failed: usize,
    /// Events in RECEIVED
    pub received: usize,

    /// Accepted events with no RECEIVED timestamp
    pub publish_errors: usize,

    /// Sent events with no ACCEPTED timestamp
    pub delivery_errors: usize,

    /// Events present in both ACCEPTED and FAILED
    pub inconsistent: usize,

    /// Sink writes that failed and were skipped
    pub skipped_writes: usize,

    /// Send latency (SENT to ACCEPTED)
    pub send_latency: LatencyPercentiles,

    /// End-to-end latency (SENT to RECEIVED)
    pub e2e_latency: LatencyPercentiles,
}

impl RunSummary {
    /// Fraction of sent events that were accepted and received, 0 when nothing was sent
    pub fn delivery_ratio(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        let lost = self.publish_errors + self.delivery_errors;
        self.sent.saturating_sub(lost) as f64 / self.sent as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_calculation() {
        let values: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let percentiles = LatencyPercentiles::from_values(&values);

        assert_eq!(percentiles.count, 10);
        assert_eq!(percentiles.min, 1.0);
        assert_eq!(percentiles.max, 10.0);
        assert!((percentiles.p50 - 5.5).abs() < 0.01);
        assert!((percentiles.mean - 5.5).abs() < 0.01);
    }

    #[test]
    fn test_percentile_single_value() {
        let percentiles = LatencyPercentiles::from_values(&[42.0]);
        assert_eq!(percentiles.min, 42.0);
        assert_eq!(percentiles.p99, 42.0);
        assert_eq!(percentiles.stddev, 0.0);
    }

    #[test]
    fn test_percentile_interpolates_between_ranks() {
        assert_eq!(percentile(&[0.0, 10.0], 0.9), 9.0);
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 1.0), 3.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_percentile_empty() {
        let percentiles = LatencyPercentiles::from_values(&[]);
        assert_eq!(percentiles, LatencyPercentiles::default());
    }

    #[test]
    fn test_from_seconds_converts_to_millis() {
        let percentiles = LatencyPercentiles::from_seconds(&[5.0, 9.0]);
        assert_eq!(percentiles.min, 5000.0);
        assert_eq!(percentiles.max, 9000.0);
        assert_eq!(percentiles.mean, 7000.0);
    }

    #[test]
    fn test_from_seconds_large_set_uses_histogram() {
        let values: Vec<f64> = (0..EXACT_PERCENTILE_LIMIT + 1)
            .map(|i| (i % 100 + 1) as f64 / 1000.0)
            .collect();
        let percentiles = LatencyPercentiles::from_seconds(&values);

        assert_eq!(percentiles.count, values.len());
        assert!((percentiles.min - 1.0).abs() < 0.01);
        assert!((percentiles.max - 100.0).abs() < 0.1);
        assert!((percentiles.p50 - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut histogram = LatencyHistogram::new().unwrap();
        for i in 1..=100 {
            histogram.record_secs(i as f64 / 1000.0);
        }

        let percentiles = histogram.percentiles();
        assert_eq!(histogram.len(), 100);
        assert!((percentiles.min - 1.0).abs() < 0.1);
        assert!((percentiles.max - 100.0).abs() < 0.1);
        assert!((percentiles.p50 - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_histogram_negative_clamped() {
        let mut histogram = LatencyHistogram::new().unwrap();
        histogram.record_secs(-0.5);
        assert_eq!(histogram.len(), 1);
        assert_eq!(histogram.percentiles().max, 0.0);
    }

    #[test]
    fn test_delivery_ratio() {
        let summary = RunSummary {
            sent: 4,
            publish_errors: 1,
            ..Default::default()
        };
        assert_eq!(summary.delivery_ratio(), 0.75);

        let rejected = RunSummary {
            sent: 4,
            publish_errors: 1,
            delivery_errors: 1,
            ..Default::default()
        };
        assert_eq!(rejected.delivery_ratio(), 0.5);
        assert_eq!(RunSummary::default().delivery_ratio(), 0.0);
    }
}
