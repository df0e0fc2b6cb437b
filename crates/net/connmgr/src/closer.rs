//! Channel-backed connection closer.

use libp2p::PeerId;
use libp2p::swarm::ConnectionId;
use tokio::sync::mpsc;
use tracing::debug;

use crate::traits::ConnectionCloser;
use crate::types::CloseRequest;

/// Forwards close requests to whoever owns the swarm.
#[derive(Debug, Clone)]
pub struct ChannelCloser {
    tx: mpsc::UnboundedSender<CloseRequest>,
}

/// Create a closer and the receiving half, usually handed to
/// [`ConnManagerBehaviour`](crate::ConnManagerBehaviour).
pub fn close_channel() -> (ChannelCloser, mpsc::UnboundedReceiver<CloseRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelCloser { tx }, rx)
}

impl ConnectionCloser for ChannelCloser {
    fn close_connection(&self, peer_id: PeerId, connection_id: ConnectionId) {
        if self
            .tx
            .send(CloseRequest {
                peer_id,
                connection_id,
            })
            .is_err()
        {
            debug!(%peer_id, ?connection_id, "close request dropped, receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_reach_receiver() {
        let (closer, mut rx) = close_channel();
        let peer_id = PeerId::random();
        closer.close_connection(peer_id, ConnectionId::new_unchecked(7));

        let request = rx.try_recv().unwrap();
        assert_eq!(request.peer_id, peer_id);
        assert_eq!(request.connection_id, ConnectionId::new_unchecked(7));
    }

    #[test]
    fn test_send_without_receiver_is_harmless() {
        let (closer, rx) = close_channel();
        drop(rx);
        closer.close_connection(PeerId::random(), ConnectionId::new_unchecked(1));
    }
}
