//! Values exchanged with the connection manager.

use std::collections::HashMap;
use std::time::Duration;

use libp2p::core::Endpoint;
use libp2p::swarm::ConnectionId;
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use tokio::sync::watch;
use web_time::Instant;

/// An established connection as seen by notifiees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub peer_id: PeerId,
    pub connection_id: ConnectionId,
    pub remote_addr: Multiaddr,
    pub endpoint: Endpoint,
}

impl ConnectionInfo {
    pub fn is_outbound(&self) -> bool {
        self.endpoint == Endpoint::Dialer
    }
}

/// A stream opened or closed on an established connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub peer_id: PeerId,
    pub connection_id: ConnectionId,
    pub protocol: Option<StreamProtocol>,
}

/// Tag metadata of a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub first_seen: Instant,
    /// Sum of plain tags and decaying tag values.
    pub value: i64,
    /// Plain and decaying tags by name.
    pub tags: HashMap<String, i64>,
    /// Open connections by remote address, with the instant each was opened.
    pub conns: HashMap<Multiaddr, Instant>,
}

/// Diagnostic summary of a connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnManagerInfo {
    pub low_water: usize,
    pub high_water: usize,
    pub grace_period: Duration,
    pub silence_period: Duration,
    pub last_trim: Option<Instant>,
    pub connections: usize,
    pub peers: usize,
}

/// Request to close one connection, issued by a trim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseRequest {
    pub peer_id: PeerId,
    pub connection_id: ConnectionId,
}

/// Cancellation scope for a trim run.
///
/// A trim checks the context before each close. Closes already issued are kept.
#[derive(Debug, Clone, Default)]
pub struct TrimContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl TrimContext {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// Cancelled once `true` is sent on the channel, or the sender is dropped.
    pub fn with_cancel(cancel: watch::Receiver<bool>) -> Self {
        Self {
            cancel: Some(cancel),
            deadline: None,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: None,
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        if let Some(cancel) = &self.cancel {
            if *cancel.borrow() || cancel.has_changed().is_err() {
                return true;
            }
        }
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Why a trim did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimSkip {
    /// The manager is closed.
    Closed,
    /// The previous trim ran less than a silence period ago.
    Silenced,
    /// The connection count does not exceed the low water mark.
    BelowLowWater,
}

/// Outcome of a trim run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimReport {
    Skipped(TrimSkip),
    Trimmed {
        /// Connections chosen from the snapshot.
        selected: usize,
        /// Close requests actually issued.
        closed: usize,
        /// Whether the context was cancelled before every victim was closed.
        cancelled: bool,
    },
}

impl TrimReport {
    pub fn closed(&self) -> usize {
        match self {
            Self::Skipped(_) => 0,
            Self::Trimmed { closed, .. } => *closed,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}
