use std::sync::Arc;
use std::time::Duration;

use bastion_net_connmgr::{
    BasicConnManager, ConnManager, ConnManagerBehaviour, ConnManagerConfig, LifecycleManager,
    close_channel,
};
use libp2p_swarm::Swarm;
use libp2p_swarm_test::SwarmExt;

type Manager = Arc<LifecycleManager<BasicConnManager>>;

fn new_swarm(config: ConnManagerConfig) -> (Swarm<ConnManagerBehaviour<Manager>>, Manager) {
    let (closer, requests) = close_channel();
    let manager = Arc::new(LifecycleManager::new(
        BasicConnManager::new(config, closer).unwrap(),
    ));
    let behaviour_manager = Arc::clone(&manager);
    let swarm = Swarm::new_ephemeral_tokio(move |_| {
        ConnManagerBehaviour::new(behaviour_manager, requests)
    });
    (swarm, manager)
}

fn unlimited() -> ConnManagerConfig {
    ConnManagerConfig {
        low_water: 10,
        high_water: 20,
        grace_period: Duration::ZERO,
        silence_period: Duration::ZERO,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_connections_are_tracked() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();

    let (mut swarm1, manager1) = new_swarm(unlimited());
    let (mut swarm2, manager2) = new_swarm(unlimited());

    swarm1.listen().with_memory_addr_external().await;
    swarm2.connect(&mut swarm1).await;

    assert_eq!(manager1.get_info().connections, 1);
    assert_eq!(manager2.get_info().connections, 1);
    assert!(manager1.tag_info(swarm2.local_peer_id()).is_some());
}

#[tokio::test]
async fn test_trim_spares_protected_peer() {
    let (mut swarm1, manager1) = new_swarm(ConnManagerConfig {
        low_water: 1,
        high_water: 1,
        grace_period: Duration::ZERO,
        silence_period: Duration::ZERO,
        ..Default::default()
    });
    let (mut swarm2, _) = new_swarm(unlimited());
    let (mut swarm3, _) = new_swarm(unlimited());

    let peer2 = *swarm2.local_peer_id();
    let peer3 = *swarm3.local_peer_id();
    manager1.protect(&peer3, "bootnode");

    swarm1.listen().with_memory_addr_external().await;
    swarm2.connect(&mut swarm1).await;
    swarm3.connect(&mut swarm1).await;

    tokio::spawn(swarm2.loop_on_next());
    tokio::spawn(swarm3.loop_on_next());

    // The second connection pushed swarm1 above its high water mark.
    tokio::time::timeout(Duration::from_secs(10), async {
        while swarm1.is_connected(&peer2) {
            swarm1.next_swarm_event().await;
        }
    })
    .await
    .unwrap();

    assert!(swarm1.is_connected(&peer3));
    assert!(manager1.get_info().last_trim.is_some());
}
