//! Connection manager configuration.

use std::time::Duration;

use crate::error::ConnManagerError;

/// Connections kept after a trim.
pub const DEFAULT_LOW_WATER: usize = 25;
/// Connection count above which a trim is triggered.
pub const DEFAULT_HIGH_WATER: usize = 50;
/// New peers are never trimmed during this period.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);
/// Minimum time between two trims.
pub const DEFAULT_SILENCE_PERIOD: Duration = Duration::from_secs(10);
/// Decayer tick resolution.
pub const DEFAULT_DECAY_RESOLUTION: Duration = Duration::from_secs(60);

/// Watermarks and timings of a [`BasicConnManager`](crate::BasicConnManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnManagerConfig {
    pub low_water: usize,
    pub high_water: usize,
    pub grace_period: Duration,
    pub silence_period: Duration,
    pub decay_resolution: Duration,
}

impl Default for ConnManagerConfig {
    fn default() -> Self {
        Self {
            low_water: DEFAULT_LOW_WATER,
            high_water: DEFAULT_HIGH_WATER,
            grace_period: DEFAULT_GRACE_PERIOD,
            silence_period: DEFAULT_SILENCE_PERIOD,
            decay_resolution: DEFAULT_DECAY_RESOLUTION,
        }
    }
}

impl ConnManagerConfig {
    /// Default timings with the given maximum connection count as high water mark.
    pub fn with_max_connections(max_connections: usize) -> Self {
        Self {
            high_water: max_connections,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConnManagerError> {
        if self.low_water > self.high_water {
            return Err(ConnManagerError::InvalidWatermarks {
                low: self.low_water,
                high: self.high_water,
            });
        }
        Ok(())
    }
}
