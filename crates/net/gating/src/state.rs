//! The gating policy engine.
//!
//! [`GatingState`] combines ban and trust sets over peer identities with three
//! address filter sets (banned, trusted, known-private) and answers the four
//! admission questions a libp2p host asks during a connection's lifetime.
//!
//! Trust always overrides ban. A private address is only dialable once it is
//! explicitly trusted or has been learned from a successful inbound
//! connection; learned addresses are never forgotten.

use std::collections::HashSet;
use std::fmt;

use bastion_net_filter::{Action, FilterSet, PrivateRanges, extract_ip, host_range};
use ipnet::IpNet;
use libp2p::{Multiaddr, PeerId};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::events::{EventEmitter, GatingEvent};
use crate::gate::{AcceptGate, DialGate, Direction, Gate, TrustPolicy};
use crate::metrics::GatingMetrics;

/// Admission policy shared by every connection attempt of a node.
pub struct GatingState {
    private: PrivateRanges,
    trust_policy: TrustPolicy,
    known_private_addrs: RwLock<FilterSet>,
    banned_addrs: RwLock<FilterSet>,
    trusted_addrs: RwLock<FilterSet>,
    banned_peers: RwLock<HashSet<PeerId>>,
    trusted_peers: RwLock<HashSet<PeerId>>,
    events: EventEmitter,
    metrics: GatingMetrics,
}

/// Point-in-time summary of the gating configuration, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatingSnapshot {
    pub trust_policy: TrustPolicy,
    pub banned_addr_rules: usize,
    pub trusted_addr_rules: usize,
    pub known_private_addrs: usize,
    pub banned_peers: usize,
    pub trusted_peers: usize,
}

impl Default for GatingState {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

impl fmt::Debug for GatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatingState")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl GatingState {
    /// Build a gating state. Missing inputs become empty sets: nothing banned,
    /// nothing trusted.
    pub fn new(
        banned_addrs: Option<FilterSet>,
        trusted_addrs: Option<FilterSet>,
        banned_peers: Option<HashSet<PeerId>>,
        trusted_peers: Option<HashSet<PeerId>>,
    ) -> Self {
        Self {
            private: PrivateRanges::default(),
            trust_policy: TrustPolicy::default(),
            // No private address is known until learned.
            known_private_addrs: RwLock::new(FilterSet::deny_by_default()),
            banned_addrs: RwLock::new(banned_addrs.unwrap_or_else(FilterSet::accept_by_default)),
            trusted_addrs: RwLock::new(trusted_addrs.unwrap_or_else(FilterSet::deny_by_default)),
            banned_peers: RwLock::new(banned_peers.unwrap_or_default()),
            trusted_peers: RwLock::new(trusted_peers.unwrap_or_default()),
            events: EventEmitter::default(),
            metrics: GatingMetrics::default(),
        }
    }

    /// Use a different set of private ranges.
    pub fn with_private_ranges(mut self, private: PrivateRanges) -> Self {
        self.private = private;
        self
    }

    /// Choose how the authenticated checkpoint treats direction.
    pub fn with_trust_policy(mut self, trust_policy: TrustPolicy) -> Self {
        self.trust_policy = trust_policy;
        self
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        self.trust_policy
    }

    pub fn private_ranges(&self) -> &PrivateRanges {
        &self.private
    }

    /// Subscribe to denial and learning events.
    pub fn subscribe(&self) -> broadcast::Receiver<GatingEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> GatingSnapshot {
        GatingSnapshot {
            trust_policy: self.trust_policy,
            banned_addr_rules: self.banned_addrs.read().len(),
            trusted_addr_rules: self.trusted_addrs.read().len(),
            known_private_addrs: self.known_private_addrs.read().len(),
            banned_peers: self.banned_peers.read().len(),
            trusted_peers: self.trusted_peers.read().len(),
        }
    }

    // --- runtime configuration ---

    /// Returns `true` if the peer was not banned before.
    pub fn ban_peer(&self, peer_id: PeerId) -> bool {
        self.banned_peers.write().insert(peer_id)
    }

    pub fn unban_peer(&self, peer_id: &PeerId) -> bool {
        self.banned_peers.write().remove(peer_id)
    }

    /// Returns `true` if the peer was not trusted before.
    pub fn trust_peer(&self, peer_id: PeerId) -> bool {
        self.trusted_peers.write().insert(peer_id)
    }

    pub fn untrust_peer(&self, peer_id: &PeerId) -> bool {
        self.trusted_peers.write().remove(peer_id)
    }

    /// Append a Deny rule to the banned address filter.
    pub fn ban_addr_range(&self, range: IpNet) {
        self.banned_addrs.write().add_rule(range, Action::Deny);
    }

    /// Append an Accept rule to the trusted address filter.
    pub fn trust_addr_range(&self, range: IpNet) {
        self.trusted_addrs.write().add_rule(range, Action::Accept);
    }

    // --- predicates ---

    pub fn is_peer_trusted(&self, peer_id: &PeerId) -> bool {
        self.trusted_peers.read().contains(peer_id)
    }

    pub fn is_peer_banned(&self, peer_id: &PeerId) -> bool {
        self.banned_peers.read().contains(peer_id)
    }

    /// Whether a peer may be dialed or accepted, ignoring its address.
    pub fn is_allowed_peer(&self, peer_id: &PeerId) -> bool {
        self.is_peer_trusted(peer_id) || !self.is_peer_banned(peer_id)
    }

    pub fn is_addr_trusted(&self, addr: &Multiaddr) -> bool {
        !self.trusted_addrs.read().blocked(addr)
    }

    pub fn is_addr_banned(&self, addr: &Multiaddr) -> bool {
        self.banned_addrs.read().blocked(addr)
    }

    pub fn is_private(&self, addr: &Multiaddr) -> bool {
        self.private.is_private(addr)
    }

    /// Whether a private address has been learned as reachable.
    pub fn is_known_private(&self, addr: &Multiaddr) -> bool {
        !self.known_private_addrs.read().blocked(addr)
    }

    /// Number of learned private addresses.
    pub fn known_private_count(&self) -> usize {
        self.known_private_addrs.read().len()
    }

    /// Whether an address may be dialed or accepted, ignoring the peer.
    pub fn address_allowed(&self, addr: &Multiaddr) -> bool {
        let public_or_known_private = !self.is_private(addr) || self.is_known_private(addr);
        self.is_addr_trusted(addr) || (!self.is_addr_banned(addr) && public_or_known_private)
    }

    /// Trusted peers bypass address checks entirely.
    pub fn is_allowed_peer_with_addr(&self, peer_id: &PeerId, addr: &Multiaddr) -> bool {
        self.is_peer_trusted(peer_id)
            || (self.is_allowed_peer(peer_id) && self.address_allowed(addr))
    }

    fn raw_addr_allowed(&self, addr: &Multiaddr) -> bool {
        self.is_addr_trusted(addr) || !self.is_addr_banned(addr)
    }

    // --- learning ---

    /// Record that a private address reached us, making it dialable from now on.
    ///
    /// The single-host range is appended with an Accept action. Public
    /// addresses and already-known ones are left alone, so repeated calls
    /// converge on the same filter state.
    pub fn mark_private_addr_as_known(&self, addr: &Multiaddr) {
        if !self.is_private(addr) {
            return;
        }
        let Some(ip) = extract_ip(addr) else {
            return;
        };

        let mut known = self.known_private_addrs.write();
        if !known.ip_blocked(ip) {
            return;
        }
        if known.add_rule_unique(host_range(ip), Action::Accept) {
            drop(known);
            debug!(%addr, "marking private addr as known");
            self.metrics.inc_private_addrs_learned();
            self.events.private_addr_learned(addr);
        }
    }

    // --- decision bookkeeping ---

    fn log_gate(&self) {
        debug!(config = ?self.snapshot(), "gated a connection");
    }

    fn finish(
        &self,
        gate: Gate,
        allow: bool,
        peer_id: Option<&PeerId>,
        addr: Option<&Multiaddr>,
    ) -> bool {
        self.metrics.record(gate, allow);
        if !allow {
            self.events.denied(gate, peer_id.copied(), addr);
            self.log_gate();
        }
        allow
    }
}

impl DialGate for GatingState {
    fn can_dial_peer(&self, peer_id: &PeerId) -> bool {
        let allow = self.is_allowed_peer(peer_id);
        if !allow {
            info!(%peer_id, "disallowing peer dial (peer)");
        }
        self.finish(Gate::DialPeer, allow, Some(peer_id), None)
    }

    fn can_dial_addr(&self, peer_id: &PeerId, addr: &Multiaddr) -> bool {
        let allow = self.is_allowed_peer_with_addr(peer_id, addr);
        if !allow {
            info!(%peer_id, %addr, "disallowing peer dial (peer + address)");
        }
        self.finish(Gate::DialAddr, allow, Some(peer_id), Some(addr))
    }
}

impl AcceptGate for GatingState {
    fn can_accept_raw(&self, remote_addr: &Multiaddr) -> bool {
        let allow = self.raw_addr_allowed(remote_addr);
        if allow {
            self.mark_private_addr_as_known(remote_addr);
        } else {
            info!(addr = %remote_addr, "refusing to accept inbound connection");
        }
        self.finish(Gate::AcceptRaw, allow, None, Some(remote_addr))
    }

    fn can_accept_authenticated(
        &self,
        direction: Direction,
        peer_id: &PeerId,
        remote_addr: &Multiaddr,
    ) -> bool {
        let allow = match (self.trust_policy, direction) {
            (TrustPolicy::Symmetric, _) | (TrustPolicy::Asymmetric, Direction::Outbound) => {
                self.is_allowed_peer_with_addr(peer_id, remote_addr)
            }
            (TrustPolicy::Asymmetric, Direction::Inbound) => {
                self.is_peer_trusted(peer_id)
                    || (self.is_allowed_peer(peer_id) && self.raw_addr_allowed(remote_addr))
            }
        };
        if !allow {
            info!(
                %peer_id,
                addr = %remote_addr,
                ?direction,
                "refusing authenticated connection"
            );
        }
        self.finish(Gate::AcceptSecured, allow, Some(peer_id), Some(remote_addr))
    }
}
