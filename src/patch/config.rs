#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::MAX_BLOCK_SIZE;

/// Sizing for a rack. Everything the audio side needs is allocated up front
/// from these numbers.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RackConfig {
    pub sample_rate: f32,
    /// Largest block rendered in one pass; longer host buffers are chunked.
    pub block_size: usize,
    pub max_units: usize,
    /// Lane capacity, applied separately to inputs and outputs.
    pub max_lanes: usize,
    pub command_capacity: usize,
    pub notification_capacity: usize,
}

impl Default for RackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            block_size: 128,
            max_units: 64,
            max_lanes: 512,
            command_capacity: 256,
            notification_capacity: 1024,
        }
    }
}

impl RackConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_max_units(mut self, max_units: usize) -> Self {
        self.max_units = max_units;
        self
    }

    pub fn with_max_lanes(mut self, max_lanes: usize) -> Self {
        self.max_lanes = max_lanes;
        self
    }

    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Copy with every field forced into a usable range.
    pub fn normalized(self) -> Self {
        let sample_rate = if self.sample_rate.is_finite() && self.sample_rate >= 1.0 {
            self.sample_rate
        } else {
            Self::default().sample_rate
        };
        Self {
            sample_rate,
            block_size: self.block_size.clamp(1, MAX_BLOCK_SIZE),
            max_units: self.max_units.max(1),
            max_lanes: self.max_lanes.max(1),
            command_capacity: self.command_capacity.max(1),
            notification_capacity: self.notification_capacity.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_is_clamped() {
        let config = RackConfig::default().with_block_size(0).normalized();
        assert_eq!(config.block_size, 1);
        let config = RackConfig::default()
            .with_block_size(MAX_BLOCK_SIZE * 4)
            .normalized();
        assert_eq!(config.block_size, MAX_BLOCK_SIZE);
    }

    #[test]
    fn bad_sample_rate_falls_back() {
        let config = RackConfig::default().with_sample_rate(f32::NAN).normalized();
        assert_eq!(config.sample_rate, 48_000.0);
    }

    #[test]
    fn builder_sets_fields() {
        let config = RackConfig::default()
            .with_sample_rate(44_100.0)
            .with_max_units(8)
            .with_max_lanes(32)
            .with_command_capacity(4)
            .with_notification_capacity(16);
        assert_eq!(config.sample_rate, 44_100.0);
        assert_eq!(config.max_units, 8);
        assert_eq!(config.max_lanes, 32);
        assert_eq!(config.command_capacity, 4);
        assert_eq!(config.notification_capacity, 16);
    }
}
