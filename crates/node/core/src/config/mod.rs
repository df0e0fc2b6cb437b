//! Node configuration handling.
//!
//! Configuration is split into submodules:
//! - `gating` - ban and trust lists, trust policy
//! - `connections` - connection manager watermarks and timings
//! - `network` - listen and external addresses
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Unknown keys are rejected.

mod connections;
mod duration;
mod gating;
mod network;

pub use connections::ConnectionsConfig;
pub use gating::GatingConfig;
pub use network::{DEFAULT_LISTEN_ADDR, NetworkConfig};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Complete node configuration (TOML-serializable).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BastionConfig {
    pub gating: GatingConfig,
    pub connections: ConnectionsConfig,
    pub network: NetworkConfig,
}

impl BastionConfig {
    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load a configuration file, or use defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_toml()?).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(BastionConfig::from_toml("").unwrap(), BastionConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = BastionConfig::from_toml(
            r#"
            [gating]
            banned_addrs = ["203.0.113.0/24"]
            trusted_addrs = ["10.1.0.0/16"]
            symmetric_trust = false

            [connections]
            low_water = 10
            max_connections = 40
            grace_period = "1m"
            silence_period = "5s"

            [network]
            external_addr = "/ip4/198.51.100.7/tcp/8302"
            "#,
        )
        .unwrap();

        assert_eq!(config.gating.banned_addrs, vec!["203.0.113.0/24"]);
        assert!(!config.gating.symmetric_trust);
        assert_eq!(config.connections.low_water, 10);
        assert_eq!(config.connections.max_connections, 40);
        assert_eq!(config.connections.grace_period, Duration::from_secs(60));
        assert_eq!(config.connections.silence_period, Duration::from_secs(5));
        assert_eq!(
            config.network.external_addr.as_deref(),
            Some("/ip4/198.51.100.7/tcp/8302")
        );
        // untouched fields keep their defaults
        assert_eq!(config.connections.decay_resolution, Duration::from_secs(60));
        assert_eq!(config.gating.private_ranges.len(), 6);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            BastionConfig::from_toml("[gating]\nbanned = []\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(BastionConfig::from_toml("[bogus]\n").is_err());
    }

    #[test]
    fn test_bad_duration_rejected() {
        assert!(BastionConfig::from_toml("[connections]\ngrace_period = \"soon\"\n").is_err());
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = BastionConfig::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("grace_period = \"30s\""));
        assert_eq!(BastionConfig::from_toml(&toml).unwrap(), config);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bastion.toml");

        let mut config = BastionConfig::default();
        config.connections.max_connections = 80;
        config.save(&path).unwrap();

        let loaded = BastionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            BastionConfig::load(dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(
            BastionConfig::load_or_default(None).unwrap(),
            BastionConfig::default()
        );
    }
}
