//! Discovery integration tests.
//!
//! Two full nodes on a shared loopback UDP port must find each other,
//! and a trust record gained from one run must resolve beacons in the
//! next.

use std::time::Duration;

use booth_core::config::Settings;
use booth_core::node::Node;

/// Per-process port offset so parallel test binaries do not collide.
fn test_discovery_port(base: u16) -> u16 {
    base + (std::process::id() % 100) as u16
}

#[tokio::test]
#[ignore = "UDP broadcast unreliable in CI environments (especially macOS)"]
async fn test_two_nodes_discover_each_other() {
    let port = test_discovery_port(41300);

    let dir_a = tempfile::tempdir().expect("temp dir");
    let dir_b = tempfile::tempdir().expect("temp dir");

    let settings_a = Settings::with_config_dir(dir_a.path().to_path_buf()).expect("settings");
    settings_a.set_device_name("Node A");
    let settings_b = Settings::with_config_dir(dir_b.path().to_path_buf()).expect("settings");
    settings_b.set_device_name("Node B");

    let node_a = Node::start_on(settings_a, port).await.expect("start a");
    let node_b = Node::start_on(settings_b, port).await.expect("start b");

    let alias_b = node_b.identity().alias().to_string();

    // Beacons go out every 3 seconds; allow a couple of rounds
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let mut seen = false;
    while std::time::Instant::now() < deadline {
        let peers = node_a.discovery().peers().await;
        if peers.iter().any(|p| p.device_name == alias_b) {
            seen = true;

            let peer = peers
                .into_iter()
                .find(|p| p.device_name == alias_b)
                .expect("peer");
            // Without prior trust the peer surfaces under its alias
            assert!(!peer.is_trusted);
            assert_eq!(peer.transfer_port, node_b.manager().receiver_port());
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert!(seen, "node A should discover node B");

    node_a.stop();
    node_b.stop();
}

#[tokio::test]
async fn test_trust_store_survives_restart() {
    let dir = tempfile::tempdir().expect("temp dir");

    {
        let settings = Settings::with_config_dir(dir.path().to_path_buf()).expect("settings");
        let node = Node::start_on(settings, 0).await.expect("start");
        node.trust()
            .lock()
            .await
            .add_trusted_peer("peer-device", "Alice's Laptop", "aa11")
            .expect("add");
        node.stop();
    }

    let settings = Settings::with_config_dir(dir.path().to_path_buf()).expect("settings");
    let node = Node::start_on(settings, 0).await.expect("restart");

    {
        let trust = node.trust().lock().await;
        let record = trust.get_peer_by_key("aa11").expect("record survived");
        assert_eq!(record.real_name, "Alice's Laptop");
    }
    node.stop();
}

#[tokio::test]
async fn test_identity_stable_across_restarts() {
    let dir = tempfile::tempdir().expect("temp dir");

    let first_key;
    let first_public_id;
    {
        let settings = Settings::with_config_dir(dir.path().to_path_buf()).expect("settings");
        let node = Node::start_on(settings, 0).await.expect("start");
        first_key = node.identity().public_key_hex();
        first_public_id = node.identity().public_id();
        node.stop();
    }

    let settings = Settings::with_config_dir(dir.path().to_path_buf()).expect("settings");
    let node = Node::start_on(settings, 0).await.expect("restart");

    // Long-term key persists, session identity does not
    assert_eq!(node.identity().public_key_hex(), first_key);
    assert_ne!(node.identity().public_id(), first_public_id);
    node.stop();
}

#[tokio::test]
async fn test_restart_reuses_device_id() {
    let dir = tempfile::tempdir().expect("temp dir");

    let settings = Settings::with_config_dir(dir.path().to_path_buf()).expect("settings");
    let first_id = settings.device_id().to_string();
    drop(settings);

    let settings = Settings::with_config_dir(dir.path().to_path_buf()).expect("settings");
    assert_eq!(settings.device_id(), first_id);
}
