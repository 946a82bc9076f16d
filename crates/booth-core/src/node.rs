//! Top-level service wiring.
//!
//! Discovery and the transfer manager depend on each other at startup:
//! beacons must advertise the transfer listener port, but the listener
//! only exists once the manager has started. The node resolves this with
//! a two-phase init: construct both, start the manager (binding the
//! listener), publish the bound port to discovery, then start discovery.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Settings;
use crate::crypto::DeviceIdentity;
use crate::discovery::DiscoveryService;
use crate::error::Result;
use crate::event::EventBus;
use crate::transfer::TransferManager;
use crate::trust::TrustStore;
use crate::DISCOVERY_PORT;

/// A running Transfer Booth instance: identity, trust store, discovery
/// and transfer manager wired together.
#[derive(Debug)]
pub struct Node {
    settings: Arc<Settings>,
    identity: Arc<DeviceIdentity>,
    trust: Arc<Mutex<TrustStore>>,
    events: EventBus,
    discovery: DiscoveryService,
    manager: TransferManager,
}

impl Node {
    /// Load persistent state and start all services.
    ///
    /// # Errors
    ///
    /// Returns an error if persistent state cannot be loaded, the
    /// discovery socket cannot be bound, or no transfer port is
    /// available.
    pub async fn start(settings: Settings) -> Result<Self> {
        Self::start_on(settings, DISCOVERY_PORT).await
    }

    /// Start with a specific discovery port (tests bind ephemeral ports).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`start`](Self::start).
    pub async fn start_on(settings: Settings, discovery_port: u16) -> Result<Self> {
        let settings = Arc::new(settings);

        let identity = Arc::new(DeviceIdentity::load_or_generate(
            settings.identity_key_path(),
        )?);
        let trust = Arc::new(Mutex::new(TrustStore::load_from(
            settings.trust_store_path(),
        )?));
        let events = EventBus::new();

        tracing::info!(
            "Starting Transfer Booth as '{}' (alias '{}')",
            settings.device_name(),
            identity.alias()
        );

        let manager = TransferManager::new(
            Arc::clone(&settings),
            Arc::clone(&identity),
            Arc::clone(&trust),
            events.clone(),
        );

        let discovery = DiscoveryService::new(
            discovery_port,
            Arc::clone(&identity),
            Arc::clone(&trust),
            Arc::clone(&settings),
            events.clone(),
        )?;

        // Phase two: the listener must be bound before beacons advertise it
        let device_name = settings.device_name();
        manager.start(&device_name).await?;
        discovery.set_transfer_port(manager.receiver_port());
        discovery.start();

        tracing::info!(
            "Transfer Booth ready - receiver port {}",
            manager.receiver_port()
        );

        Ok(Self {
            settings,
            identity,
            trust,
            events,
            discovery,
            manager,
        })
    }

    /// Stop all services.
    pub fn stop(&self) {
        tracing::info!("Shutting down Transfer Booth services");
        self.manager.stop();
        self.discovery.stop();
    }

    /// The runtime settings.
    #[must_use]
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// The local device identity.
    #[must_use]
    pub fn identity(&self) -> &Arc<DeviceIdentity> {
        &self.identity
    }

    /// The trust store.
    #[must_use]
    pub fn trust(&self) -> &Arc<Mutex<TrustStore>> {
        &self.trust
    }

    /// The event bus external consumers register sinks on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The discovery service.
    #[must_use]
    pub fn discovery(&self) -> &DiscoveryService {
        &self.discovery
    }

    /// The transfer manager.
    #[must_use]
    pub fn manager(&self) -> &TransferManager {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_node_start_and_stop() {
        let dir = tempfile::tempdir().expect("temp dir");
        let settings =
            Settings::with_config_dir(dir.path().to_path_buf()).expect("settings");

        // Ephemeral discovery port so parallel tests do not collide
        let node = Node::start_on(settings, 0).await.expect("start");

        assert!(node.manager().receiver_port() >= crate::TRANSFER_PORT_MIN);
        assert!(node.settings().identity_key_path().exists());

        node.stop();
    }
}
