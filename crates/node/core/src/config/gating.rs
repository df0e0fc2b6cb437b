//! Gating configuration.

use std::collections::HashSet;

use bastion_net_filter::{Action, DEFAULT_PRIVATE_CIDRS, FilterSet, PrivateRanges};
use bastion_net_gating::{GatingState, TrustPolicy};
use libp2p::PeerId;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Ban and trust lists (TOML-serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatingConfig {
    /// Address ranges that may not connect, unless trusted.
    pub banned_addrs: Vec<String>,

    /// Address ranges that may always connect.
    pub trusted_addrs: Vec<String>,

    /// Peers that may not connect, unless trusted.
    pub banned_peers: Vec<String>,

    /// Peers that may always connect, from any address.
    pub trusted_peers: Vec<String>,

    /// Let anyone we may dial also dial us.
    pub symmetric_trust: bool,

    /// Ranges treated as private.
    pub private_ranges: Vec<String>,
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            banned_addrs: Vec::new(),
            trusted_addrs: Vec::new(),
            banned_peers: Vec::new(),
            trusted_peers: Vec::new(),
            symmetric_trust: true,
            private_ranges: DEFAULT_PRIVATE_CIDRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GatingConfig {
    pub fn trust_policy(&self) -> TrustPolicy {
        if self.symmetric_trust {
            TrustPolicy::Symmetric
        } else {
            TrustPolicy::Asymmetric
        }
    }

    /// Deny rules over an accept-by-default set.
    pub fn banned_filter(&self) -> Result<FilterSet, ConfigError> {
        Ok(FilterSet::from_cidrs(
            &self.banned_addrs,
            Action::Deny,
            Action::Accept,
        )?)
    }

    /// Accept rules over a deny-by-default set.
    pub fn trusted_filter(&self) -> Result<FilterSet, ConfigError> {
        Ok(FilterSet::from_cidrs(
            &self.trusted_addrs,
            Action::Accept,
            Action::Deny,
        )?)
    }

    pub fn banned_peer_set(&self) -> Result<HashSet<PeerId>, ConfigError> {
        parse_peers(&self.banned_peers)
    }

    pub fn trusted_peer_set(&self) -> Result<HashSet<PeerId>, ConfigError> {
        parse_peers(&self.trusted_peers)
    }

    pub fn private(&self) -> Result<PrivateRanges, ConfigError> {
        Ok(PrivateRanges::from_cidrs(&self.private_ranges)?)
    }

    /// Assemble the gating policy. Any malformed entry aborts.
    pub fn build(&self) -> Result<GatingState, ConfigError> {
        let state = GatingState::new(
            Some(self.banned_filter()?),
            Some(self.trusted_filter()?),
            Some(self.banned_peer_set()?),
            Some(self.trusted_peer_set()?),
        )
        .with_private_ranges(self.private()?)
        .with_trust_policy(self.trust_policy());
        Ok(state)
    }
}

fn parse_peers(peers: &[String]) -> Result<HashSet<PeerId>, ConfigError> {
    peers
        .iter()
        .map(|s| {
            s.trim()
                .parse::<PeerId>()
                .map_err(|e| ConfigError::InvalidPeerId {
                    peer_id: s.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}
