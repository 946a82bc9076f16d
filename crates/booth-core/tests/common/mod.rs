//! Common test utilities for Transfer Booth integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use booth_core::config::Settings;
use booth_core::crypto::DeviceIdentity;
use booth_core::event::{EventBus, EventSink};
use booth_core::transfer::session::SessionContext;
use booth_core::transfer::TransferManager;
use booth_core::trust::TrustStore;

/// One side of a transfer: settings, identity, trust store and manager
/// rooted in a private temp directory.
pub struct Endpoint {
    pub settings: Arc<Settings>,
    pub identity: Arc<DeviceIdentity>,
    pub trust: Arc<Mutex<TrustStore>>,
    pub events: EventBus,
    pub manager: TransferManager,
    _dir: tempfile::TempDir,
}

impl Endpoint {
    /// Build an endpoint with a fresh config and save directory.
    pub fn new(device_name: &str) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let settings =
            Arc::new(Settings::with_config_dir(dir.path().join("config")).expect("settings"));
        settings.set_device_name(device_name);
        settings
            .set_save_dir(dir.path().join("downloads"))
            .expect("save dir");

        let identity = Arc::new(
            DeviceIdentity::load_or_generate(settings.identity_key_path()).expect("identity"),
        );
        let trust = Arc::new(Mutex::new(
            TrustStore::load_from(settings.trust_store_path()).expect("trust store"),
        ));
        let events = EventBus::new();

        let manager = TransferManager::new(
            Arc::clone(&settings),
            Arc::clone(&identity),
            Arc::clone(&trust),
            events.clone(),
        );

        Self {
            settings,
            identity,
            trust,
            events,
            manager,
            _dir: dir,
        }
    }

    /// The session context this endpoint's transfers run with.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            identity: Arc::clone(&self.identity),
            trust: Arc::clone(&self.trust),
            events: self.events.clone(),
        }
    }

    pub fn save_dir(&self) -> PathBuf {
        self.settings.save_dir()
    }

    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self._dir.path().join(name)
    }
}

/// Event sink that answers every `transfer_request` through the manager.
pub struct AutoResponder {
    manager: TransferManager,
    accept: bool,
}

impl AutoResponder {
    /// Register an auto-responder on an endpoint's event bus.
    pub fn install(endpoint: &Endpoint, accept: bool) {
        endpoint.events.register(Arc::new(Self {
            manager: endpoint.manager.clone(),
            accept,
        }));
    }
}

impl EventSink for AutoResponder {
    fn on_event(&self, event: &str, data: &Value) {
        if event == "transfer_request" {
            if let Some(transfer_id) = data["transfer_id"].as_str() {
                self.manager.respond_to_request(transfer_id, self.accept);
            }
        }
    }
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent directories");
    }
    std::fs::write(&path, content).expect("write test file");
    path
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Assert that two files have identical content.
pub fn assert_files_equal(path1: &Path, path2: &Path) {
    let content1 = std::fs::read(path1).expect("read first file");
    let content2 = std::fs::read(path2).expect("read second file");
    assert_eq!(content1, content2, "File contents differ");
}

/// Poll `condition` until it holds or the timeout elapses.
pub async fn wait_for<F>(mut condition: F, timeout: Duration, what: &str)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("Timed out waiting for: {what}");
}
