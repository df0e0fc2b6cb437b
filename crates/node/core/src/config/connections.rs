//! Connection manager configuration.

use std::time::Duration;

use bastion_net_connmgr::{
    ConnManagerConfig, DEFAULT_DECAY_RESOLUTION, DEFAULT_GRACE_PERIOD, DEFAULT_HIGH_WATER,
    DEFAULT_LOW_WATER, DEFAULT_SILENCE_PERIOD,
};
use serde::{Deserialize, Serialize};

use crate::config::duration;
use crate::error::ConfigError;

/// Watermarks and timings (TOML-serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionsConfig {
    /// Connections kept after a trim.
    pub low_water: usize,

    /// High water mark: trimming starts above this many connections.
    pub max_connections: usize,

    /// New peers are never trimmed during this period.
    #[serde(with = "duration")]
    pub grace_period: Duration,

    /// Minimum time between two trims.
    #[serde(with = "duration")]
    pub silence_period: Duration,

    /// Decaying tag tick resolution.
    #[serde(with = "duration")]
    pub decay_resolution: Duration,

    /// How often the background task checks the high water mark.
    #[serde(with = "duration")]
    pub trim_interval: Duration,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            low_water: DEFAULT_LOW_WATER,
            max_connections: DEFAULT_HIGH_WATER,
            grace_period: DEFAULT_GRACE_PERIOD,
            silence_period: DEFAULT_SILENCE_PERIOD,
            decay_resolution: DEFAULT_DECAY_RESOLUTION,
            trim_interval: DEFAULT_SILENCE_PERIOD,
        }
    }
}

impl ConnectionsConfig {
    pub fn to_conn_manager_config(&self) -> Result<ConnManagerConfig, ConfigError> {
        let config = ConnManagerConfig {
            low_water: self.low_water,
            high_water: self.max_connections,
            grace_period: self.grace_period,
            silence_period: self.silence_period,
            decay_resolution: self.decay_resolution,
        };
        config.validate()?;
        Ok(config)
    }
}
