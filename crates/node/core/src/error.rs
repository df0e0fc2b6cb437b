//! Configuration errors.

use std::path::PathBuf;

use bastion_net_connmgr::ConnManagerError;
use bastion_net_filter::FilterError;
use thiserror::Error;

/// Anything that prevents a configuration from being loaded or turned into
/// running components. Always fatal at start-up.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid peer id {peer_id:?}: {reason}")]
    InvalidPeerId { peer_id: String, reason: String },
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    ConnManager(#[from] ConnManagerError),
}
