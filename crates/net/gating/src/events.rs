//! Gating events and non-blocking broadcast emitter.

use libp2p::{Multiaddr, PeerId};
use tokio::sync::broadcast;

use crate::gate::Gate;

/// Observable outcomes of the gating policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatingEvent {
    /// A checkpoint refused a connection.
    Denied {
        gate: Gate,
        peer_id: Option<PeerId>,
        addr: Option<Multiaddr>,
    },
    /// An inbound connection taught us that a private address is reachable.
    PrivateAddrLearned { addr: Multiaddr },
}

impl GatingEvent {
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Non-blocking broadcast emitter. Slow subscribers drop events independently.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<GatingEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: GatingEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatingEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn denied(&self, gate: Gate, peer_id: Option<PeerId>, addr: Option<&Multiaddr>) {
        if self.tx.receiver_count() == 0 {
            return;
        }
        self.emit(GatingEvent::Denied {
            gate,
            peer_id,
            addr: addr.cloned(),
        });
    }

    pub fn private_addr_learned(&self, addr: &Multiaddr) {
        if self.tx.receiver_count() == 0 {
            return;
        }
        self.emit(GatingEvent::PrivateAddrLearned { addr: addr.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_emitter_basic() {
        let emitter = EventEmitter::default();
        let mut rx = emitter.subscribe();
        let addr: Multiaddr = "/ip4/10.0.0.1/tcp/1".parse().unwrap();

        emitter.private_addr_learned(&addr);

        match rx.recv().await.unwrap() {
            GatingEvent::PrivateAddrLearned { addr: learned } => assert_eq!(learned, addr),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_event_emitter_no_subscribers() {
        let emitter = EventEmitter::default();
        emitter.denied(Gate::AcceptRaw, None, None);
        assert_eq!(emitter.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_denied_event_is_denial() {
        let emitter = EventEmitter::default();
        let mut rx = emitter.subscribe();
        emitter.denied(Gate::DialPeer, None, None);
        let event = rx.recv().await.unwrap();
        assert!(event.is_denial());
    }
}
