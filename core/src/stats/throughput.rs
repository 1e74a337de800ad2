//! Sliding one-second throughput series

use chrono::{DateTime, Duration, Utc};

/// Events per second at each timestamp after the first
///
/// For `t[i]` the value is the number of earlier timestamps no more than one
/// second before it, scanning back from `t[i-1]` and stopping at the first
/// one outside the window. `t[i]` itself is not counted, and `t[0]` never
/// produces a point. Input must be sorted ascending.
pub fn throughput_series(sorted: &[DateTime<Utc>]) -> Vec<(DateTime<Utc>, f64)> {
    let window = Duration::seconds(1);
    let mut series = Vec::with_capacity(sorted.len().saturating_sub(1));

    for i in 1..sorted.len() {
        let now = sorted[i];
        let count = sorted[..i]
            .iter()
            .rev()
            .take_while(|&&earlier| now - earlier <= window)
            .count();
        series.push((now, count as f64));
    }

    series
}
