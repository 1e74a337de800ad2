//! Channel and map sizing for the event timestamp pipeline

use crate::pace::CapacityEstimate;

/// Largest per-class channel buffer ever allocated
pub const MAX_EVENTS_BUFFER: usize = 1 << 20;

/// Largest record map pre-allocation; maps grow past it on demand
pub const MAX_RECORD_CAPACITY: usize = 1 << 18;

/// Buffer configuration for the sender's event pipeline
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Per-class channel buffer size (load generator -> drain task)
    pub events_buffer: usize,

    /// Initial capacity of each per-class record map
    pub record_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            events_buffer: 10_000,
            record_capacity: 0,
        }
    }
}

impl ChannelConfig {
    /// Size buffers from a pace plan estimate, clamped to the allocation ceilings
    pub fn from_estimate(estimate: CapacityEstimate) -> Self {
        Self::default()
            .with_events_buffer(estimate.in_flight)
            .with_record_capacity(estimate.total_events)
    }

    /// Set the per-class channel buffer size
    pub fn with_events_buffer(mut self, size: usize) -> Self {
        self.events_buffer = size.clamp(1, MAX_EVENTS_BUFFER);
        self
    }

    /// Set the initial record map capacity
    pub fn with_record_capacity(mut self, capacity: usize) -> Self {
        self.record_capacity = capacity.min(MAX_RECORD_CAPACITY);
        self
    }

    /// Buffer size actually handed to the channels
    pub(crate) fn bounded_events_buffer(&self) -> usize {
        self.events_buffer.clamp(1, MAX_EVENTS_BUFFER)
    }

    /// Map capacity actually pre-allocated
    pub(crate) fn bounded_record_capacity(&self) -> usize {
        self.record_capacity.min(MAX_RECORD_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_default() {
        let config = ChannelConfig::default();
        assert_eq!(config.events_buffer, 10_000);
        assert_eq!(config.record_capacity, 0);
    }

    #[test]
    fn test_channel_config_from_estimate() {
        let config = ChannelConfig::from_estimate(CapacityEstimate {
            in_flight: 500,
            total_events: 11_000,
        });
        assert_eq!(config.events_buffer, 500);
        assert_eq!(config.record_capacity, 11_000);
    }

    #[test]
    fn test_channel_config_buffer_never_zero() {
        let config = ChannelConfig::default().with_events_buffer(0);
        assert_eq!(config.events_buffer, 1);
    }

    #[test]
    fn test_channel_config_clamps_huge_estimate() {
        let config = ChannelConfig::from_estimate(CapacityEstimate {
            in_flight: usize::MAX,
            total_events: usize::MAX,
        });
        assert_eq!(config.events_buffer, MAX_EVENTS_BUFFER);
        assert_eq!(config.record_capacity, MAX_RECORD_CAPACITY);
    }

    #[test]
    fn test_bounded_sizes_ignore_direct_field_writes() {
        let config = ChannelConfig {
            events_buffer: 0,
            record_capacity: usize::MAX,
        };
        assert_eq!(config.bounded_events_buffer(), 1);
        assert_eq!(config.bounded_record_capacity(), MAX_RECORD_CAPACITY);
    }
}
