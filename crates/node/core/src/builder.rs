//! Assembly of the node's admission and connection-management components.
//!
//! [`NodeComponents::build`] turns a [`BastionConfig`] into the running
//! pieces: the gating state, the lifecycle-wrapped connection manager, the
//! DHT validator and the addresses to listen on and advertise. Any invalid
//! configuration entry aborts the build.

use std::sync::Arc;
use std::time::Duration;

use bastion_net_connmgr::{
    BasicConnManager, CloseRequest, ConnManager, ConnManagerBehaviour, ConnManagerError,
    ConnectionInfo, LifecycleManager, close_channel,
};
use bastion_net_gating::{GatingBehaviour, GatingState};
use libp2p::{Multiaddr, swarm::NetworkBehaviour};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};

use crate::config::BastionConfig;
use crate::error::ConfigError;
use crate::validator::{LoggingValidator, NamespacedValidator, default_validator};

/// Connection manager type used by nodes.
pub type NodeConnManager = LifecycleManager<BasicConnManager>;

/// Admission control and connection management for a swarm.
///
/// Gating runs first, so a denied connection never reaches the connection
/// manager.
#[derive(NetworkBehaviour)]
pub struct BastionBehaviour {
    gating: GatingBehaviour<Arc<GatingState>>,
    connections: ConnManagerBehaviour<Arc<NodeConnManager>>,
}

impl BastionBehaviour {
    pub fn gating(&self) -> &GatingBehaviour<Arc<GatingState>> {
        &self.gating
    }

    pub fn connections(&self) -> &ConnManagerBehaviour<Arc<NodeConnManager>> {
        &self.connections
    }
}

/// Everything a node needs from its configuration.
pub struct NodeComponents {
    pub gating: Arc<GatingState>,
    pub connections: Arc<NodeConnManager>,
    pub validator: Arc<LoggingValidator<NamespacedValidator>>,
    pub listen_addrs: Vec<Multiaddr>,
    pub advertised_addrs: Vec<Multiaddr>,
    trim_interval: Duration,
    close_requests: Option<mpsc::UnboundedReceiver<CloseRequest>>,
}

impl NodeComponents {
    pub fn build(config: &BastionConfig) -> Result<Self, ConfigError> {
        let gating = Arc::new(config.gating.build()?);

        let (closer, close_requests) = close_channel();
        let manager =
            BasicConnManager::new(config.connections.to_conn_manager_config()?, closer)?;
        let connections = Arc::new(LifecycleManager::new(manager));
        connections.set_on_connect(Arc::new(|conn: &ConnectionInfo| {
            debug!(peer_id = %conn.peer_id, addr = %conn.remote_addr, "peer connected");
        }));
        connections.set_on_disconnect(Arc::new(|conn: &ConnectionInfo| {
            debug!(peer_id = %conn.peer_id, addr = %conn.remote_addr, "peer disconnected");
        }));

        let listen_addrs = config.network.listen_multiaddrs()?;
        let advertised_addrs = config.network.advertised(gating.private_ranges())?;

        info!(
            trust_policy = ?gating.trust_policy(),
            low_water = config.connections.low_water,
            high_water = config.connections.max_connections,
            advertised = advertised_addrs.len(),
            "node components built"
        );

        Ok(Self {
            gating,
            connections,
            validator: Arc::new(default_validator()),
            listen_addrs,
            advertised_addrs,
            trim_interval: config.connections.trim_interval,
            close_requests: Some(close_requests),
        })
    }

    /// The swarm behaviour bound to these components. Only the first call
    /// returns a behaviour, since trim close requests have a single consumer.
    pub fn take_behaviour(&mut self) -> Option<BastionBehaviour> {
        let close_requests = self.close_requests.take()?;
        Some(BastionBehaviour {
            gating: GatingBehaviour::new(Arc::clone(&self.gating)),
            connections: ConnManagerBehaviour::new(Arc::clone(&self.connections), close_requests),
        })
    }

    /// Start the background trim and decayer tasks. Requires a tokio runtime.
    pub fn spawn_tasks(&self) -> Vec<JoinHandle<()>> {
        let manager = self.connections.inner();
        vec![
            manager.spawn_background_trim(self.trim_interval),
            manager.spawn_decayer(),
        ]
    }

    /// Close the connection manager, stopping its tasks. One-shot.
    pub fn shutdown(&self) -> Result<(), ConnManagerError> {
        self.connections.close()
    }
}
