//! Network configuration for TOML persistence.

use bastion_net_filter::{PrivateRanges, advertised_addrs, parse_multiaddr};
use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "/ip4/0.0.0.0/tcp/8302";

/// Listen and external addresses (TOML-serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Listening addresses (as string multiaddresses)
    pub listen_addrs: Vec<String>,

    /// Publicly reachable address to advertise in addition to the listen addresses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_addr: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addrs: vec![DEFAULT_LISTEN_ADDR.to_string()],
            external_addr: None,
        }
    }
}

impl NetworkConfig {
    pub fn listen_multiaddrs(&self) -> Result<Vec<Multiaddr>, ConfigError> {
        self.listen_addrs
            .iter()
            .map(|s| parse_multiaddr(s).map_err(Into::into))
            .collect()
    }

    pub fn external_multiaddr(&self) -> Result<Option<Multiaddr>, ConfigError> {
        self.external_addr
            .as_deref()
            .map(parse_multiaddr)
            .transpose()
            .map_err(Into::into)
    }

    /// Addresses to advertise: listen plus external, minus private ones.
    pub fn advertised(&self, private: &PrivateRanges) -> Result<Vec<Multiaddr>, ConfigError> {
        let listen = self.listen_multiaddrs()?;
        let external = self.external_multiaddr()?;
        Ok(advertised_addrs(&listen, external.as_ref(), private))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertised_drops_private() {
        let config = NetworkConfig {
            listen_addrs: vec![
                "/ip4/192.168.1.4/tcp/8302".to_string(),
                "/ip4/203.0.113.4/tcp/8302".to_string(),
            ],
            external_addr: Some("/ip4/198.51.100.7/tcp/8302".to_string()),
        };
        let advertised = config.advertised(&PrivateRanges::default()).unwrap();
        assert_eq!(
            advertised,
            vec![
                "/ip4/203.0.113.4/tcp/8302".parse::<Multiaddr>().unwrap(),
                "/ip4/198.51.100.7/tcp/8302".parse::<Multiaddr>().unwrap(),
            ]
        );
    }

    #[test]
    fn test_bad_external_addr_rejected() {
        let config = NetworkConfig {
            external_addr: Some("garbage".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.external_multiaddr(),
            Err(ConfigError::Filter(_))
        ));
    }
}
