use bastion_net_connmgr::ConnManager;
use bastion_node_core::{BastionBehaviour, BastionConfig, NodeComponents};
use libp2p_swarm::{ListenError, Swarm, SwarmEvent};
use libp2p_swarm_test::SwarmExt;

fn new_node(config: &BastionConfig) -> (NodeComponents, Swarm<BastionBehaviour>) {
    let mut components = NodeComponents::build(config).unwrap();
    let behaviour = components.take_behaviour().unwrap();
    let swarm = Swarm::new_ephemeral_tokio(move |_| behaviour);
    (components, swarm)
}

#[tokio::test]
async fn test_connections_reach_the_manager() {
    let (node1, mut swarm1) = new_node(&BastionConfig::default());
    let (node2, mut swarm2) = new_node(&BastionConfig::default());

    swarm1.listen().with_memory_addr_external().await;
    swarm2.connect(&mut swarm1).await;

    assert_eq!(node1.connections.get_info().connections, 1);
    assert_eq!(node2.connections.get_info().connections, 1);
    assert!(node1.connections.tag_info(swarm2.local_peer_id()).is_some());
}

#[tokio::test]
async fn test_banned_peer_never_reaches_the_manager() {
    let (_, mut swarm2) = new_node(&BastionConfig::default());

    let mut config = BastionConfig::default();
    config.gating.banned_peers = vec![swarm2.local_peer_id().to_string()];
    let (node1, mut swarm1) = new_node(&config);

    let (memory_addr, _) = swarm1.listen().with_memory_addr_external().await;
    swarm2.dial(memory_addr).unwrap();
    tokio::spawn(swarm2.loop_on_next());

    let error = swarm1
        .wait(|event| match event {
            SwarmEvent::IncomingConnectionError { error, .. } => Some(error),
            _ => None,
        })
        .await;
    assert!(matches!(error, ListenError::Denied { .. }), "unexpected error: {error:?}");
    assert_eq!(node1.connections.get_info().connections, 0);
}
