//! Narrow admission interfaces consulted at each checkpoint of a connection.
//!
//! The host composes a [`DialGate`] for outbound attempts and an [`AcceptGate`]
//! for inbound ones. [`GatingState`](crate::GatingState) implements both, but
//! hosts are free to supply their own.

use std::fmt;

use auto_impl::auto_impl;
use libp2p::{Multiaddr, PeerId};

/// Direction of an established connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// How the authenticated checkpoint treats connection direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Anyone we may dial may also dial us: the authenticated check reuses
    /// the dial predicate regardless of direction.
    #[default]
    Symmetric,
    /// Inbound authenticated connections only need the raw-accept address
    /// rule; outbound ones use the dial predicate.
    Asymmetric,
}

/// The admission checkpoints, used for logging, events and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    DialPeer,
    DialAddr,
    AcceptRaw,
    AcceptSecured,
}

impl Gate {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DialPeer => "dial_peer",
            Self::DialAddr => "dial_addr",
            Self::AcceptRaw => "accept_raw",
            Self::AcceptSecured => "accept_secured",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound admission checks.
#[auto_impl(&, Box, Arc)]
pub trait DialGate: Send + Sync {
    /// Called before dialing a peer whose addresses are not yet resolved.
    fn can_dial_peer(&self, peer_id: &PeerId) -> bool;

    /// Called for each resolved address of a peer before the socket dial.
    fn can_dial_addr(&self, peer_id: &PeerId, addr: &Multiaddr) -> bool;
}

/// Inbound admission checks.
#[auto_impl(&, Box, Arc)]
pub trait AcceptGate: Send + Sync {
    /// Called right after a transport accepted a raw connection, before any handshake.
    fn can_accept_raw(&self, remote_addr: &Multiaddr) -> bool;

    /// Called once the security handshake revealed the remote identity.
    fn can_accept_authenticated(
        &self,
        direction: Direction,
        peer_id: &PeerId,
        remote_addr: &Multiaddr,
    ) -> bool;

    /// Final checkpoint after muxer negotiation. The policy has already been
    /// applied by then, so the default admits everything.
    fn can_accept_upgraded(&self, _peer_id: &PeerId, _remote_addr: &Multiaddr) -> bool {
        true
    }
}
