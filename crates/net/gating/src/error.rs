//! Gating denial causes.

use libp2p::{Multiaddr, PeerId};
use thiserror::Error;

/// Why a connection was refused. Carried inside libp2p's `ConnectionDenied`.
#[derive(Debug, Clone, Error)]
pub enum GatingError {
    #[error("dial to peer {peer_id} denied by gating policy")]
    PeerDialDenied { peer_id: PeerId },
    #[error("dial to peer {peer_id} at {addr} denied by gating policy")]
    AddrDialDenied { peer_id: PeerId, addr: Multiaddr },
    #[error("inbound connection from {addr} denied by gating policy")]
    AcceptDenied { addr: Multiaddr },
    #[error("authenticated connection with {peer_id} at {addr} denied by gating policy")]
    SecuredDenied { peer_id: PeerId, addr: Multiaddr },
}
