// Integration tests driving real `chordring-core` nodes over real TCP
// sockets: ring creation, joining, key hand-off, successor failure, and
// graceful departure.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chordring_core::config::{Config, Mode};
use chordring_core::storage::{MemoryStorage, Storage};
use chordring_core::{ChordNode, NodeRef};

static NEXT_PORT: AtomicU16 = AtomicU16::new(21000);

fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}

fn base_config(port: u16, mode: Mode) -> Config {
    Config {
        ip: "127.0.0.1".into(),
        port,
        mode,
        m: 16,
        r: 2,
        stabilize_ms: 50,
        fix_fingers_ms: 50,
        check_predecessor_ms: 50,
        identifier_override: None,
        aes_enabled: false,
        aes_key_path: None,
        tls_enabled: false,
        ca_cert: None,
        server_cert: None,
        server_key: None,
        storage_root: std::env::temp_dir(),
    }
}

async fn start_node(port: u16, mode: Mode) -> Arc<ChordNode> {
    let config = base_config(port, mode);
    let backups: Vec<Arc<dyn Storage>> = (0..config.r).map(|_| Arc::new(MemoryStorage::new()) as Arc<dyn Storage>).collect();
    chordring_core::membership::start(config, Arc::new(MemoryStorage::new()), backups, None, None)
        .await
        .expect("node should start")
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(250)).await;
}

#[tokio::test]
async fn single_node_ring_is_its_own_successor_and_serves_lookups() {
    let port = next_port();
    let node = start_node(port, Mode::Create).await;

    let successors = node.successors();
    assert!(successors.iter().all(|s| s.id == node.info.id), "a ring of one points every successor at itself");

    let fingers = node.fingers();
    assert!(fingers.iter().all(|f| f.id == node.info.id), "a ring of one points every finger at itself");

    let id = node.local_identifier("hello.txt");
    let owner = node.find_successor(id).await.expect("lookup in a ring of one always resolves to self");
    assert_eq!(owner.id, node.info.id);

    node.shutdown().await;
}

#[tokio::test]
async fn two_node_join_splits_the_ring_and_hands_off_keys() {
    let port_a = next_port();
    let node_a = start_node(port_a, Mode::Create).await;

    let port_b = next_port();
    let node_b = start_node(
        port_b,
        Mode::Join {
            seed_ip: "127.0.0.1".into(),
            seed_port: port_a,
        },
    )
    .await;

    settle().await;

    // Each node should now see the other somewhere in its successor list or
    // as its own successor once stabilize has run a few rounds.
    let a_successors = node_a.successors();
    let b_successors = node_b.successors();
    assert!(a_successors.iter().any(|s| s.id == node_b.info.id), "A should learn about B through stabilize");
    assert!(b_successors.iter().any(|s| s.id == node_a.info.id), "B should learn about A through stabilize");

    node_a.shutdown().await;
    node_b.shutdown().await;
}

#[tokio::test]
async fn a_key_stored_after_convergence_is_retrievable_from_either_nodes_view() {
    let port_a = next_port();
    let node_a = start_node(port_a, Mode::Create).await;

    let port_b = next_port();
    let node_b = start_node(
        port_b,
        Mode::Join {
            seed_ip: "127.0.0.1".into(),
            seed_port: port_a,
        },
    )
    .await;

    // Let the two-node ring fully converge before storing anything: both
    // sides need a live predecessor, otherwise a later membership change
    // can't trigger a file hand-off (the first-ever predecessor adoption
    // never carries files, matching the source's transferFilesToPredecessor
    // behavior for an empty oldPredecessor).
    settle().await;
    settle().await;
    assert!(node_a.predecessor().is_some());
    assert!(node_b.predecessor().is_some());

    let name = "shared-key.bin";
    let payload = b"some file contents".to_vec();
    let id = node_a.local_identifier(name);
    let owner_from_a = node_a.find_successor(id).await.unwrap();
    let owner_from_b = node_b.find_successor(id).await.unwrap();
    assert_eq!(owner_from_a.id, owner_from_b.id, "both nodes should agree on who owns the key");

    node_a.call_peer_store(&owner_from_a, name, payload.clone()).await.unwrap();

    let fetched = node_b.call_peer_get(&owner_from_b, name).await.unwrap();
    assert_eq!(fetched, payload);

    node_a.shutdown().await;
    node_b.shutdown().await;
}

#[tokio::test]
async fn a_dead_owners_file_is_recovered_through_the_backup_chain() {
    let port_a = next_port();
    let node_a = start_node(port_a, Mode::Create).await;

    let port_b = next_port();
    let node_b = start_node(
        port_b,
        Mode::Join {
            seed_ip: "127.0.0.1".into(),
            seed_port: port_a,
        },
    )
    .await;

    let port_c = next_port();
    let node_c = start_node(
        port_c,
        Mode::Join {
            seed_ip: "127.0.0.1".into(),
            seed_port: port_a,
        },
    )
    .await;

    settle().await;
    settle().await;

    let name = "backed-up.bin";
    let payload = b"must survive a successor failure".to_vec();
    let id = node_a.local_identifier(name);
    let owner = node_a.find_successor(id).await.unwrap();
    node_a.call_peer_store(&owner, name, payload.clone()).await.unwrap();

    // Let a couple more stabilize rounds run so update_replica has a chance
    // to pull the new file into whichever node is backing up `owner`,
    // before that node goes away.
    settle().await;
    settle().await;

    let owner_id = owner.id;
    let nodes = [&node_a, &node_b, &node_c];
    let dead = *nodes.iter().find(|n| n.info.id == owner_id).expect("owner must be one of the running nodes");
    let survivors: Vec<&Arc<ChordNode>> = nodes.into_iter().filter(|n| n.info.id != owner_id).collect();

    // Simulate a hard failure, not a graceful departure: shutdown() skips
    // quit()'s neighbor notifications entirely, so the only way this file
    // can still be reachable afterward is through the backup chain.
    dead.shutdown().await;

    // Give the surviving nodes' stabilize loops several rounds to notice
    // the dead owner and promote the backed-up copy onto a new owner.
    let mut recovered = None;
    for _ in 0..20 {
        settle().await;
        for survivor in &survivors {
            let Ok(new_owner) = survivor.find_successor(id).await else {
                continue;
            };
            if new_owner.id == owner_id {
                continue;
            }
            if let Ok(data) = survivor.call_peer_get(&new_owner, name).await {
                recovered = Some(data);
                break;
            }
        }
        if recovered.is_some() {
            break;
        }
    }

    assert_eq!(
        recovered.as_deref(),
        Some(payload.as_slice()),
        "the backup chain should have promoted the dead owner's file onto a live successor"
    );

    for survivor in survivors {
        survivor.shutdown().await;
    }
}

#[tokio::test]
async fn find_successor_resolves_within_the_hop_budget_on_a_three_node_ring() {
    let port_a = next_port();
    let node_a = start_node(port_a, Mode::Create).await;

    let port_b = next_port();
    let node_b = start_node(
        port_b,
        Mode::Join {
            seed_ip: "127.0.0.1".into(),
            seed_port: port_a,
        },
    )
    .await;

    let port_c = next_port();
    let node_c = start_node(
        port_c,
        Mode::Join {
            seed_ip: "127.0.0.1".into(),
            seed_port: port_a,
        },
    )
    .await;

    settle().await;
    settle().await;

    for probe in ["alpha", "beta", "gamma", "delta", "epsilon"] {
        let id = node_a.local_identifier(probe);
        let result = node_a.find_successor(id).await;
        assert!(result.is_ok(), "lookup for {probe} should resolve within the hop budget: {result:?}");
    }

    node_a.shutdown().await;
    node_b.shutdown().await;
    node_c.shutdown().await;
}

#[tokio::test]
async fn files_survive_a_quit_through_the_backup_chain_not_a_handoff() {
    let port_a = next_port();
    let node_a = start_node(port_a, Mode::Create).await;

    let port_b = next_port();
    let node_b = start_node(
        port_b,
        Mode::Join {
            seed_ip: "127.0.0.1".into(),
            seed_port: port_a,
        },
    )
    .await;

    settle().await;

    let name = "leftover.bin";
    let payload = b"owned by whoever survives".to_vec();
    let id = node_a.local_identifier(name);
    let owner = node_a.find_successor(id).await.unwrap();

    // Store directly on whichever node currently owns the key.
    if owner.id == node_a.info.id {
        node_a.store_file(name, payload.clone()).unwrap();
    } else {
        node_b.store_file(name, payload.clone()).unwrap();
    }

    // Let the backup chain pick up the new file on its own before A leaves;
    // quit() itself transfers nothing.
    settle().await;

    node_a.quit().await;

    // Give B's own stabilize loop a few rounds to notice A is gone and
    // promote its backed-up copy into local storage.
    let mut fetched = None;
    for _ in 0..20 {
        settle().await;
        if let Ok(owner_after) = node_b.find_successor(id).await {
            if owner_after.id == node_b.info.id {
                if let Ok(data) = node_b.get_file(name) {
                    fetched = Some(data);
                    break;
                }
            }
        }
    }

    assert_eq!(
        fetched,
        Some(payload),
        "the file should have survived through the backup chain, not a hand-off at quit time"
    );

    node_b.shutdown().await;
}

#[tokio::test]
async fn nonexistent_key_lookup_still_resolves_to_a_live_owner() {
    let port = next_port();
    let node = start_node(port, Mode::Create).await;

    let id = node.local_identifier("never-stored.bin");
    let owner = node.find_successor(id).await.unwrap();
    let err = node.call_peer_get(&owner, "never-stored.bin").await;
    assert!(err.is_err(), "fetching a key nobody stored should fail cleanly, not hang or panic");

    node.shutdown().await;
}

#[tokio::test]
async fn empty_predecessor_reports_as_none_until_a_peer_joins() {
    let port = next_port();
    let node = start_node(port, Mode::Create).await;
    assert!(node.predecessor().is_none());

    let port_b = next_port();
    let node_b = start_node(
        port_b,
        Mode::Join {
            seed_ip: "127.0.0.1".into(),
            seed_port: port,
        },
    )
    .await;

    settle().await;
    assert!(node.predecessor().is_some(), "stabilize should populate a predecessor once a peer joins");

    node.shutdown().await;
    node_b.shutdown().await;
}

#[test]
fn node_ref_empty_never_equals_a_real_peer() {
    let real = NodeRef::new(42, "127.0.0.1", "9000");
    assert_ne!(real, NodeRef::empty());
}
