//! Connection manager capabilities.

use std::time::Duration;

use auto_impl::auto_impl;
use libp2p::swarm::ConnectionId;
use libp2p::{Multiaddr, PeerId};

use crate::decay::{BumpFn, DecayFn, DecayingTag};
use crate::error::ConnManagerError;
use crate::types::{ConnManagerInfo, ConnectionInfo, StreamInfo, TagInfo, TrimContext, TrimReport};

/// Tag-weighted connection bookkeeping with protection and trimming.
#[auto_impl(&, Arc, Box)]
pub trait ConnManager: Send + Sync {
    /// Set a tag on a peer, replacing any previous weight under the same name.
    fn tag_peer(&self, peer_id: &PeerId, tag: &str, weight: i64);

    fn untag_peer(&self, peer_id: &PeerId, tag: &str);

    /// Atomically update a tag from its current weight (zero if unset).
    fn upsert_tag(&self, peer_id: &PeerId, tag: &str, upsert: &dyn Fn(i64) -> i64);

    fn tag_info(&self, peer_id: &PeerId) -> Option<TagInfo>;

    /// Close low-value connections until the low water mark is reached.
    fn trim_open_conns(&self, ctx: &TrimContext) -> TrimReport;

    /// Exempt a peer from trimming while at least one protection tag is held.
    fn protect(&self, peer_id: &PeerId, tag: &str);

    /// Drop a protection tag. Returns whether that tag had been protecting the peer.
    fn unprotect(&self, peer_id: &PeerId, tag: &str) -> bool;

    fn is_protected(&self, peer_id: &PeerId, tag: &str) -> bool;

    /// Whether any protection tag is held for the peer.
    fn is_protected_any(&self, peer_id: &PeerId) -> bool;

    fn get_info(&self) -> ConnManagerInfo;

    /// Stop background work. Only the first call succeeds.
    fn close(&self) -> Result<(), ConnManagerError>;
}

/// Registration of tags whose value changes over time.
#[auto_impl(&, Arc, Box)]
pub trait Decayer: Send + Sync {
    fn register_decaying_tag(
        &self,
        name: &str,
        interval: Duration,
        decay: DecayFn,
        bump: BumpFn,
    ) -> Result<DecayingTag, ConnManagerError>;
}

/// Receives network notifications.
#[auto_impl(&, Arc, Box)]
pub trait Notifiee: Send + Sync {
    fn listen(&self, addr: &Multiaddr);

    fn listen_close(&self, addr: &Multiaddr);

    fn connected(&self, conn: &ConnectionInfo);

    fn disconnected(&self, conn: &ConnectionInfo);

    /// Reported by the protocol behaviour that owns the stream.
    fn opened_stream(&self, _stream: &StreamInfo) {}

    fn closed_stream(&self, _stream: &StreamInfo) {}
}

/// Closes connections chosen by a trim.
#[auto_impl(&, Arc, Box)]
pub trait ConnectionCloser: Send + Sync {
    fn close_connection(&self, peer_id: PeerId, connection_id: ConnectionId);
}
