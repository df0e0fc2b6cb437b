//! libp2p integration: feed swarm events to a notifee, execute trim closes.

use std::collections::HashMap;
use std::convert::Infallible;
use std::task::{Context, Poll};

use libp2p::{
    Multiaddr, PeerId,
    core::{Endpoint, transport::PortUse},
    swarm::{
        CloseConnection, ConnectionDenied, ConnectionId, FromSwarm, NetworkBehaviour, THandler,
        THandlerInEvent, THandlerOutEvent, ToSwarm, dummy,
    },
};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::traits::Notifiee;
use crate::types::{CloseRequest, ConnectionInfo};

/// Where a connection is in its lifetime. `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Dialing,
    Accepting,
    Connected,
    Disconnected,
}

impl ConnectionPhase {
    pub fn can_transition_to(self, next: ConnectionPhase) -> bool {
        use ConnectionPhase::*;
        matches!(
            (self, next),
            (Dialing | Accepting, Connected) | (Dialing | Accepting | Connected, Disconnected)
        )
    }
}

/// A [`NetworkBehaviour`] that reports connection lifecycle events to a
/// [`Notifiee`] and closes the connections a trim selected.
///
/// Its handler opens no streams, so it never reports them. Protocol
/// behaviours report their own streams through [`Notifiee::opened_stream`]
/// and [`Notifiee::closed_stream`].
pub struct ConnManagerBehaviour<N> {
    notifee: N,
    close_requests: mpsc::UnboundedReceiver<CloseRequest>,
    phases: HashMap<ConnectionId, ConnectionPhase>,
}

impl<N: Notifiee> ConnManagerBehaviour<N> {
    /// `close_requests` is the receiving half of [`close_channel`](crate::close_channel)
    /// whose closer was given to the manager.
    pub fn new(notifee: N, close_requests: mpsc::UnboundedReceiver<CloseRequest>) -> Self {
        Self {
            notifee,
            close_requests,
            phases: HashMap::new(),
        }
    }

    pub fn notifee(&self) -> &N {
        &self.notifee
    }

    /// Current phase of a connection. Finished connections are forgotten.
    pub fn connection_phase(&self, connection_id: &ConnectionId) -> Option<ConnectionPhase> {
        self.phases.get(connection_id).copied()
    }

    fn advance(&mut self, connection_id: ConnectionId, next: ConnectionPhase) {
        let current = self.phases.get(&connection_id).copied();
        if let Some(current) = current {
            if !current.can_transition_to(next) {
                debug!(?connection_id, ?current, ?next, "ignoring invalid phase transition");
                return;
            }
        }
        if next == ConnectionPhase::Disconnected {
            self.phases.remove(&connection_id);
        } else {
            self.phases.insert(connection_id, next);
        }
    }
}

impl<N> NetworkBehaviour for ConnManagerBehaviour<N>
where
    N: Notifiee + 'static,
{
    type ConnectionHandler = dummy::ConnectionHandler;
    type ToSwarm = Infallible;

    fn handle_pending_inbound_connection(
        &mut self,
        connection_id: ConnectionId,
        _local_addr: &Multiaddr,
        _remote_addr: &Multiaddr,
    ) -> Result<(), ConnectionDenied> {
        self.advance(connection_id, ConnectionPhase::Accepting);
        Ok(())
    }

    fn handle_established_inbound_connection(
        &mut self,
        _connection_id: ConnectionId,
        _peer: PeerId,
        _local_addr: &Multiaddr,
        _remote_addr: &Multiaddr,
    ) -> Result<THandler<Self>, ConnectionDenied> {
        Ok(dummy::ConnectionHandler)
    }

    fn handle_pending_outbound_connection(
        &mut self,
        connection_id: ConnectionId,
        _maybe_peer: Option<PeerId>,
        _addresses: &[Multiaddr],
        _effective_role: Endpoint,
    ) -> Result<Vec<Multiaddr>, ConnectionDenied> {
        self.advance(connection_id, ConnectionPhase::Dialing);
        Ok(vec![])
    }

    fn handle_established_outbound_connection(
        &mut self,
        _connection_id: ConnectionId,
        _peer: PeerId,
        _addr: &Multiaddr,
        _role_override: Endpoint,
        _port_use: PortUse,
    ) -> Result<THandler<Self>, ConnectionDenied> {
        Ok(dummy::ConnectionHandler)
    }

    fn on_swarm_event(&mut self, event: FromSwarm) {
        match event {
            FromSwarm::NewListenAddr(e) => self.notifee.listen(e.addr),
            FromSwarm::ExpiredListenAddr(e) => self.notifee.listen_close(e.addr),
            FromSwarm::ConnectionEstablished(e) => {
                self.advance(e.connection_id, ConnectionPhase::Connected);
                let info = ConnectionInfo {
                    peer_id: e.peer_id,
                    connection_id: e.connection_id,
                    remote_addr: e.endpoint.get_remote_address().clone(),
                    endpoint: if e.endpoint.is_dialer() {
                        Endpoint::Dialer
                    } else {
                        Endpoint::Listener
                    },
                };
                self.notifee.connected(&info);
            }
            FromSwarm::ConnectionClosed(e) => {
                self.advance(e.connection_id, ConnectionPhase::Disconnected);
                let info = ConnectionInfo {
                    peer_id: e.peer_id,
                    connection_id: e.connection_id,
                    remote_addr: e.endpoint.get_remote_address().clone(),
                    endpoint: if e.endpoint.is_dialer() {
                        Endpoint::Dialer
                    } else {
                        Endpoint::Listener
                    },
                };
                self.notifee.disconnected(&info);
            }
            FromSwarm::DialFailure(e) => {
                self.advance(e.connection_id, ConnectionPhase::Disconnected);
            }
            FromSwarm::ListenFailure(e) => {
                self.advance(e.connection_id, ConnectionPhase::Disconnected);
            }
            _ => {}
        }
    }

    fn on_connection_handler_event(
        &mut self,
        _peer_id: PeerId,
        _connection_id: ConnectionId,
        event: THandlerOutEvent<Self>,
    ) {
        match event {}
    }

    fn poll(&mut self, cx: &mut Context<'_>) -> Poll<ToSwarm<Self::ToSwarm, THandlerInEvent<Self>>> {
        if let Poll::Ready(Some(request)) = self.close_requests.poll_recv(cx) {
            trace!(peer_id = %request.peer_id, connection_id = ?request.connection_id, "closing trimmed connection");
            return Poll::Ready(ToSwarm::CloseConnection {
                peer_id: request.peer_id,
                connection: CloseConnection::One(request.connection_id),
            });
        }
        Poll::Pending
    }
}
