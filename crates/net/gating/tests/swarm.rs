use std::sync::Arc;

use bastion_net_filter::PrivateRanges;
use bastion_net_gating::{GatingBehaviour, GatingEvent, GatingState};
use libp2p::Multiaddr;
use libp2p_swarm::{DialError, ListenError, Swarm, SwarmEvent, dial_opts::DialOpts};
use libp2p_swarm_test::SwarmExt;

fn new_swarm(state: Arc<GatingState>) -> Swarm<GatingBehaviour<Arc<GatingState>>> {
    Swarm::new_ephemeral_tokio(move |_| GatingBehaviour::new(state))
}

#[tokio::test]
async fn test_allowed_peers_connect() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();

    let mut swarm1 = new_swarm(Arc::new(GatingState::default()));
    let mut swarm2 = new_swarm(Arc::new(GatingState::default()));

    swarm1.listen().with_memory_addr_external().await;
    swarm2.connect(&mut swarm1).await;

    assert!(swarm1.is_connected(swarm2.local_peer_id()));
    assert!(swarm2.is_connected(swarm1.local_peer_id()));
}

#[tokio::test]
async fn test_dial_to_banned_peer_is_denied() {
    let state2 = Arc::new(GatingState::default());
    let mut swarm1 = new_swarm(Arc::new(GatingState::default()));
    let mut swarm2 = new_swarm(state2.clone());

    let (memory_addr, _) = swarm1.listen().with_memory_addr_external().await;
    state2.ban_peer(*swarm1.local_peer_id());

    let opts = DialOpts::peer_id(*swarm1.local_peer_id())
        .addresses(vec![memory_addr])
        .build();
    let err = swarm2.dial(opts).unwrap_err();
    assert!(matches!(err, DialError::Denied { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_inbound_from_banned_peer_is_denied() {
    let state1 = Arc::new(GatingState::default());
    let mut swarm1 = new_swarm(state1.clone());
    let mut swarm2 = new_swarm(Arc::new(GatingState::default()));

    let (memory_addr, _) = swarm1.listen().with_memory_addr_external().await;
    state1.ban_peer(*swarm2.local_peer_id());

    swarm2.dial(memory_addr).unwrap();
    tokio::spawn(swarm2.loop_on_next());

    let error = swarm1
        .wait(|event| match event {
            SwarmEvent::IncomingConnectionError { error, .. } => Some(error),
            _ => None,
        })
        .await;
    assert!(matches!(error, ListenError::Denied { .. }), "unexpected error: {error:?}");
}

#[tokio::test]
async fn test_inbound_connection_teaches_private_address() {
    // Treat loopback as private so the tcp listener exercises learning.
    let private = PrivateRanges::from_cidrs(&["127.0.0.0/8"]).unwrap();
    let state1 = Arc::new(GatingState::default().with_private_ranges(private));
    let mut events = state1.subscribe();

    let mut swarm1 = new_swarm(state1.clone());
    let mut swarm2 = new_swarm(Arc::new(GatingState::default()));

    let (_, tcp_addr) = swarm1.listen().with_memory_addr_external().await;
    let loopback: Multiaddr = "/ip4/127.0.0.1/tcp/1".parse().unwrap();
    assert!(!state1.address_allowed(&loopback));

    swarm2.dial(tcp_addr).unwrap();
    tokio::spawn(swarm2.loop_on_next());
    swarm1
        .wait(|event| match event {
            SwarmEvent::ConnectionEstablished { .. } => Some(()),
            _ => None,
        })
        .await;

    assert!(state1.is_known_private(&loopback));
    assert!(state1.address_allowed(&loopback));
    assert!(matches!(
        events.recv().await.unwrap(),
        GatingEvent::PrivateAddrLearned { .. }
    ));
}
