//! Connection lifecycle manager.
//!
//! [`LifecycleManager`] wraps a connection manager that can also decay tags and
//! receive network notifications, and lets the host observe connects and
//! disconnects through hooks that run before the wrapped manager is notified.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use libp2p::{Multiaddr, PeerId};
use parking_lot::RwLock;

use crate::decay::{BumpFn, DecayFn, DecayingTag};
use crate::error::ConnManagerError;
use crate::traits::{ConnManager, Decayer, Notifiee};
use crate::types::{ConnManagerInfo, ConnectionInfo, StreamInfo, TagInfo, TrimContext, TrimReport};

/// Callback invoked with the connection a notification is about.
pub type ConnHook = Arc<dyn Fn(&ConnectionInfo) + Send + Sync>;

fn noop_hook() -> ConnHook {
    Arc::new(|_| {})
}

/// Proxies a connection manager and adds connect/disconnect hooks.
pub struct LifecycleManager<M> {
    manager: M,
    on_connect: RwLock<ConnHook>,
    on_disconnect: RwLock<ConnHook>,
}

impl<M: fmt::Debug> fmt::Debug for LifecycleManager<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

impl<M> LifecycleManager<M>
where
    M: ConnManager + Decayer + Notifiee,
{
    /// Wrap a manager. Both hooks start as no-ops.
    pub fn new(manager: M) -> Self {
        Self {
            manager,
            on_connect: RwLock::new(noop_hook()),
            on_disconnect: RwLock::new(noop_hook()),
        }
    }

    /// Replace the hook run before a connection is reported to the manager.
    pub fn set_on_connect(&self, hook: ConnHook) {
        *self.on_connect.write() = hook;
    }

    /// Replace the hook run before a disconnection is reported to the manager.
    pub fn set_on_disconnect(&self, hook: ConnHook) {
        *self.on_disconnect.write() = hook;
    }

    /// The notification sink to register with the network.
    pub fn notifee(&self) -> &dyn Notifiee {
        self
    }

    pub fn inner(&self) -> &M {
        &self.manager
    }
}

impl<M> ConnManager for LifecycleManager<M>
where
    M: ConnManager + Decayer + Notifiee,
{
    fn tag_peer(&self, peer_id: &PeerId, tag: &str, weight: i64) {
        self.manager.tag_peer(peer_id, tag, weight);
    }

    fn untag_peer(&self, peer_id: &PeerId, tag: &str) {
        self.manager.untag_peer(peer_id, tag);
    }

    fn upsert_tag(&self, peer_id: &PeerId, tag: &str, upsert: &dyn Fn(i64) -> i64) {
        self.manager.upsert_tag(peer_id, tag, upsert);
    }

    fn tag_info(&self, peer_id: &PeerId) -> Option<TagInfo> {
        self.manager.tag_info(peer_id)
    }

    fn trim_open_conns(&self, ctx: &TrimContext) -> TrimReport {
        self.manager.trim_open_conns(ctx)
    }

    fn protect(&self, peer_id: &PeerId, tag: &str) {
        self.manager.protect(peer_id, tag);
    }

    fn unprotect(&self, peer_id: &PeerId, tag: &str) -> bool {
        self.manager.unprotect(peer_id, tag)
    }

    fn is_protected(&self, peer_id: &PeerId, tag: &str) -> bool {
        self.manager.is_protected(peer_id, tag)
    }

    fn is_protected_any(&self, peer_id: &PeerId) -> bool {
        self.manager.is_protected_any(peer_id)
    }

    fn get_info(&self) -> ConnManagerInfo {
        self.manager.get_info()
    }

    fn close(&self) -> Result<(), ConnManagerError> {
        self.manager.close()
    }
}

impl<M> Decayer for LifecycleManager<M>
where
    M: ConnManager + Decayer + Notifiee,
{
    fn register_decaying_tag(
        &self,
        name: &str,
        interval: Duration,
        decay: DecayFn,
        bump: BumpFn,
    ) -> Result<DecayingTag, ConnManagerError> {
        self.manager
            .register_decaying_tag(name, interval, decay, bump)
    }
}

impl<M> Notifiee for LifecycleManager<M>
where
    M: ConnManager + Decayer + Notifiee,
{
    fn listen(&self, addr: &Multiaddr) {
        self.manager.listen(addr);
    }

    fn listen_close(&self, addr: &Multiaddr) {
        self.manager.listen_close(addr);
    }

    fn connected(&self, conn: &ConnectionInfo) {
        let hook = self.on_connect.read().clone();
        hook(conn);
        self.manager.connected(conn);
    }

    fn disconnected(&self, conn: &ConnectionInfo) {
        let hook = self.on_disconnect.read().clone();
        hook(conn);
        self.manager.disconnected(conn);
    }

    fn opened_stream(&self, stream: &StreamInfo) {
        self.manager.opened_stream(stream);
    }

    fn closed_stream(&self, stream: &StreamInfo) {
        self.manager.closed_stream(stream);
    }
}
