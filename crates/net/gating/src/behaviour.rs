//! libp2p integration: consult the gates from the swarm's connection hooks.

use std::convert::Infallible;
use std::task::{Context, Poll};

use libp2p::{
    Multiaddr, PeerId,
    core::{Endpoint, transport::PortUse},
    swarm::{
        ConnectionDenied, ConnectionId, FromSwarm, NetworkBehaviour, THandler, THandlerInEvent,
        THandlerOutEvent, ToSwarm, dummy,
    },
};

use crate::error::GatingError;
use crate::gate::{AcceptGate, DialGate, Direction};

/// A [`NetworkBehaviour`] that applies a gating policy to every connection.
///
/// It has no protocol of its own; combine it with other behaviours through
/// `#[derive(NetworkBehaviour)]`.
///
/// | swarm hook                     | gate                              |
/// |--------------------------------|-----------------------------------|
/// | pending outbound (peer known)  | [`DialGate::can_dial_peer`], then [`DialGate::can_dial_addr`] on the candidates |
/// | established outbound           | [`DialGate::can_dial_addr`]        |
/// | pending inbound                | [`AcceptGate::can_accept_raw`]     |
/// | established inbound            | [`AcceptGate::can_accept_authenticated`] |
#[derive(Debug)]
pub struct GatingBehaviour<G> {
    gate: G,
}

impl<G> GatingBehaviour<G>
where
    G: DialGate + AcceptGate,
{
    pub fn new(gate: G) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }
}

impl<G> NetworkBehaviour for GatingBehaviour<G>
where
    G: DialGate + AcceptGate + 'static,
{
    type ConnectionHandler = dummy::ConnectionHandler;
    type ToSwarm = Infallible;

    fn handle_pending_inbound_connection(
        &mut self,
        _connection_id: ConnectionId,
        _local_addr: &Multiaddr,
        remote_addr: &Multiaddr,
    ) -> Result<(), ConnectionDenied> {
        if !self.gate.can_accept_raw(remote_addr) {
            return Err(ConnectionDenied::new(GatingError::AcceptDenied {
                addr: remote_addr.clone(),
            }));
        }
        Ok(())
    }

    fn handle_established_inbound_connection(
        &mut self,
        _connection_id: ConnectionId,
        peer: PeerId,
        _local_addr: &Multiaddr,
        remote_addr: &Multiaddr,
    ) -> Result<THandler<Self>, ConnectionDenied> {
        if !self
            .gate
            .can_accept_authenticated(Direction::Inbound, &peer, remote_addr)
        {
            return Err(ConnectionDenied::new(GatingError::SecuredDenied {
                peer_id: peer,
                addr: remote_addr.clone(),
            }));
        }
        Ok(dummy::ConnectionHandler)
    }

    fn handle_pending_outbound_connection(
        &mut self,
        _connection_id: ConnectionId,
        maybe_peer: Option<PeerId>,
        addresses: &[Multiaddr],
        _effective_role: Endpoint,
    ) -> Result<Vec<Multiaddr>, ConnectionDenied> {
        let Some(peer_id) = maybe_peer else {
            return Ok(vec![]);
        };
        if !self.gate.can_dial_peer(&peer_id) {
            return Err(ConnectionDenied::new(GatingError::PeerDialDenied {
                peer_id,
            }));
        }
        // Addresses cannot be removed from the dial, only refused as a whole.
        // The established-outbound check still covers the one actually used.
        if let Some(first) = addresses.first() {
            if !addresses.iter().any(|addr| self.gate.can_dial_addr(&peer_id, addr)) {
                return Err(ConnectionDenied::new(GatingError::AddrDialDenied {
                    peer_id,
                    addr: first.clone(),
                }));
            }
        }
        Ok(vec![])
    }

    fn handle_established_outbound_connection(
        &mut self,
        _connection_id: ConnectionId,
        peer: PeerId,
        addr: &Multiaddr,
        _role_override: Endpoint,
        _port_use: PortUse,
    ) -> Result<THandler<Self>, ConnectionDenied> {
        if !self.gate.can_dial_addr(&peer, addr) {
            return Err(ConnectionDenied::new(GatingError::AddrDialDenied {
                peer_id: peer,
                addr: addr.clone(),
            }));
        }
        Ok(dummy::ConnectionHandler)
    }

    fn on_swarm_event(&mut self, _event: FromSwarm) {}

    fn on_connection_handler_event(
        &mut self,
        _peer_id: PeerId,
        _connection_id: ConnectionId,
        event: THandlerOutEvent<Self>,
    ) {
        match event {}
    }

    fn poll(&mut self, _cx: &mut Context<'_>) -> Poll<ToSwarm<Self::ToSwarm, THandlerInEvent<Self>>> {
        Poll::Pending
    }
}
