//! Per-event correlation of SENT against ACCEPTED, FAILED and RECEIVED

use chrono::{DateTime, Utc};

use super::{RecordSnapshot, SinkWriter};
use super::{DELIVERY_FAILED_ON_BROKER, DELIVERY_MISSING_FROM_FAILED, E2E_LATENCY, NOT_DELIVERED, SEND_LATENCY};

/// What correlating one snapshot produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correlation {
    /// Sent events never accepted
    pub delivery_errors: usize,
    /// Accepted events never received
    pub publish_errors: usize,
    /// Accepted events also present in FAILED
    pub inconsistent: usize,
    /// SENT to ACCEPTED, in seconds
    pub send_latencies: Vec<f64>,
    /// SENT to RECEIVED, in seconds
    pub e2e_latencies: Vec<f64>,
}

/// Signed difference `to - from` in fractional seconds
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let d = to - from;
    // subsec_nanos carries the sign of the whole duration
    d.num_seconds() as f64 + f64::from(d.subsec_nanos()) / 1e9
}

/// Walk SENT and write latency samples and errors to the sink
///
/// Every sample and error is stamped with the event's send time. Events are
/// visited in send order, ties broken by id. An event that was never accepted
/// yields only its delivery error.
pub(crate) fn correlate(records: &RecordSnapshot, writer: &mut SinkWriter<'_>) -> Correlation {
    let mut out = Correlation::default();

    let mut sent: Vec<(&String, &DateTime<Utc>)> = records.sent.events.iter().collect();
    sent.sort_unstable_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));

    for (event_id, &sent_at) in sent {
        match records.accepted.get(event_id) {
            Some(accepted_at) => {
                if records.failed.contains(event_id) {
                    out.inconsistent += 1;
                    tracing::warn!(%event_id, "Event is both accepted and failed, keeping accepted");
                }
                let latency = seconds_between(sent_at, accepted_at);
                out.send_latencies.push(latency);
                writer.sample(sent_at, SEND_LATENCY, latency);
            }
            None => {
                out.delivery_errors += 1;
                if records.failed.contains(event_id) {
                    writer.error(sent_at, DELIVERY_FAILED_ON_BROKER);
                } else {
                    tracing::warn!(%event_id, "Event not accepted but missing from failed map");
                    writer.error(sent_at, DELIVERY_MISSING_FROM_FAILED);
                }
                // Never accepted: no latency and no delivery check
                continue;
            }
        }

        match records.received.get(event_id) {
            Some(received_at) => {
                let latency = seconds_between(sent_at, received_at);
                out.e2e_latencies.push(latency);
                writer.sample(sent_at, E2E_LATENCY, latency);
            }
            None => {
                out.publish_errors += 1;
                writer.error(sent_at, NOT_DELIVERED);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_seconds_between_fractional() {
        let a = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let b = Utc.timestamp_millis_opt(1_700_000_001_250).unwrap();
        assert_eq!(seconds_between(a, b), 1.25);
        assert_eq!(seconds_between(b, a), -1.25);
    }
}
