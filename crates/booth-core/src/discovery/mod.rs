//! LAN peer discovery for Transfer Booth.
//!
//! Devices announce themselves with periodic signed JSON beacons over UDP
//! broadcast and maintain a liveness-bounded table of peers seen on the
//! network.
//!
//! ## Protocol
//!
//! - Port: 41234 (UDP), shared by all instances (`SO_REUSEADDR`)
//! - Broadcast interval: every 3 seconds
//! - Peers unseen for 10 seconds are evicted
//!
//! ## Identity masking
//!
//! Outgoing beacons carry only the **ephemeral** per-run identity: the
//! `device_id` and `public_id` fields hold the run's random UUID and
//! `device_name`/`alias` hold the run's pseudonym, so the long-term
//! device identity is never broadcast in the clear. The `auth_tag` is an
//! Ed25519 signature over the beacon's canonical bytes; peers that
//! completed a transfer with us before verify it against their stored
//! public key and resolve the alias back to our real name.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, Mutex};
use tokio::task::{self, JoinHandle};

use crate::config::{platform_name, Settings};
use crate::crypto::DeviceIdentity;
use crate::error::Result;
use crate::event::EventBus;
use crate::trust::{signable_bytes, TrustStore};
use crate::{APP_ID, DISCOVERY_INTERVAL, PEER_TIMEOUT};

/// The JSON payload broadcast over UDP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beacon {
    /// Application identifier; foreign values are dropped on receipt
    pub app_id: String,
    /// Device id as seen on the wire (the ephemeral public id)
    pub device_id: String,
    /// Display name as seen on the wire (the ephemeral alias)
    pub device_name: String,
    /// Port of the device's API adapter
    pub api_port: u16,
    /// Port of the device's transfer listener
    pub transfer_port: u16,
    /// `"windows" | "darwin" | "linux"`
    pub platform: String,
    /// Ephemeral alias, empty for older senders
    #[serde(default)]
    pub alias: String,
    /// Ephemeral session id, empty for older senders
    #[serde(default)]
    pub public_id: String,
    /// Hex Ed25519 signature over the canonical beacon bytes
    #[serde(default)]
    pub auth_tag: String,
}

/// A discovered device on the LAN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    /// Stable device id when trusted, ephemeral public id otherwise
    pub device_id: String,
    /// Real name when trusted, ephemeral alias otherwise
    pub device_name: String,
    /// Source address of the device's beacons
    pub ip: IpAddr,
    /// Port of the device's API adapter
    pub api_port: u16,
    /// Port of the device's transfer listener
    pub transfer_port: u16,
    /// `"windows" | "darwin" | "linux"`
    pub platform: String,
    /// Unix timestamp of the last beacon from this device
    pub last_seen: f64,
    /// Whether the beacon signature verified against the trust store
    pub is_trusted: bool,
}

/// Peer table plus everything needed to resolve incoming beacons.
#[derive(Clone)]
struct PeerRegistry {
    peers: Arc<Mutex<HashMap<String, Peer>>>,
    trust: Arc<Mutex<TrustStore>>,
    events: EventBus,
    own_device_id: String,
    own_public_id: String,
}

impl PeerRegistry {
    /// Decode and apply one received datagram.
    async fn handle_packet(&self, data: &[u8], source: SocketAddr) {
        let beacon: Beacon = match serde_json::from_slice(data) {
            Ok(beacon) => beacon,
            Err(e) => {
                tracing::debug!("Ignoring invalid discovery packet from {source}: {e}");
                return;
            }
        };

        if beacon.app_id != APP_ID {
            return;
        }
        // Our own beacons come back on every broadcast interface
        if beacon.device_id == self.own_device_id
            || beacon.device_id == self.own_public_id
            || beacon.public_id == self.own_public_id
        {
            return;
        }

        let resolved = {
            let trust = self.trust.lock().await;
            trust.verify_peer(&beacon).cloned()
        };

        let (device_id, device_name, is_trusted) = match resolved {
            Some(trusted) => {
                tracing::debug!(
                    "'{}' resolved to trusted peer {}",
                    beacon.alias,
                    trusted.real_name
                );
                (trusted.device_id, trusted.real_name, true)
            }
            None => {
                let device_id = if beacon.public_id.is_empty() {
                    beacon.device_id.clone()
                } else {
                    beacon.public_id.clone()
                };
                let device_name = if beacon.alias.is_empty() {
                    beacon.device_name.clone()
                } else {
                    beacon.alias.clone()
                };
                (device_id, device_name, false)
            }
        };

        let peer = Peer {
            device_id: device_id.clone(),
            device_name,
            ip: source.ip(),
            api_port: beacon.api_port,
            transfer_port: beacon.transfer_port,
            platform: beacon.platform,
            last_seen: unix_now(),
            is_trusted,
        };

        let is_new = {
            let mut peers = self.peers.lock().await;
            let is_new = !peers.contains_key(&device_id);
            peers.insert(device_id, peer.clone());
            is_new
        };

        if is_new {
            tracing::info!("Discovered peer: {} ({})", peer.device_name, peer.ip);
            self.events.peer_discovered(&peer);
        }
    }

    /// Evict peers not refreshed within the liveness window.
    async fn evict_stale(&self) {
        let cutoff = unix_now() - PEER_TIMEOUT.as_secs_f64();

        let stale: Vec<Peer> = {
            let mut peers = self.peers.lock().await;
            let stale_ids: Vec<String> = peers
                .iter()
                .filter(|(_, peer)| peer.last_seen < cutoff)
                .map(|(id, _)| id.clone())
                .collect();
            stale_ids
                .iter()
                .filter_map(|id| peers.remove(id))
                .collect()
        };

        for peer in stale {
            tracing::info!("Peer lost: {} ({})", peer.device_name, peer.ip);
            self.events.peer_lost(&peer);
        }
    }
}

/// Manages LAN device discovery via UDP broadcast.
pub struct DiscoveryService {
    socket: Arc<UdpSocket>,
    registry: PeerRegistry,
    identity: Arc<DeviceIdentity>,
    settings: Arc<Settings>,
    port: u16,
    transfer_port: Arc<AtomicU16>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl DiscoveryService {
    /// Bind the shared discovery socket on the given UDP port.
    ///
    /// The socket is created with `SO_REUSEADDR` and `SO_BROADCAST` set
    /// before binding so multiple instances can share the port, and is
    /// used for both sending and receiving.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound.
    pub fn new(
        port: u16,
        identity: Arc<DeviceIdentity>,
        trust: Arc<Mutex<TrustStore>>,
        settings: Arc<Settings>,
        events: EventBus,
    ) -> Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;

        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;

        #[cfg(target_os = "macos")]
        socket.set_reuse_port(true)?;

        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&addr.into())?;

        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;

        let (shutdown_tx, _) = broadcast::channel(1);

        let registry = PeerRegistry {
            peers: Arc::new(Mutex::new(HashMap::new())),
            trust,
            events,
            own_device_id: settings.device_id().to_string(),
            own_public_id: identity.public_id().to_string(),
        };

        Ok(Self {
            socket: Arc::new(socket),
            registry,
            identity,
            settings,
            port,
            transfer_port: Arc::new(AtomicU16::new(0)),
            shutdown_tx,
            tasks: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Publish the transfer listener port carried in outgoing beacons.
    ///
    /// Set by the node once the transfer manager has bound its listener
    /// (discovery is constructed first, started last).
    pub fn set_transfer_port(&self, port: u16) {
        self.transfer_port.store(port, Ordering::Relaxed);
    }

    /// Start the broadcast, receive and cleanup loops.
    pub fn start(&self) {
        tracing::info!("Starting discovery on UDP port {}", self.port);

        let mut tasks = self
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.push(self.spawn_broadcast_loop());
        tasks.push(self.spawn_recv_loop());
        tasks.push(self.spawn_cleanup_loop());
    }

    /// Stop all discovery loops.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }
        tracing::info!("Discovery service stopped");
    }

    /// Snapshot the currently known peers.
    pub async fn peers(&self) -> Vec<Peer> {
        self.registry.peers.lock().await.values().cloned().collect()
    }

    fn spawn_broadcast_loop(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let identity = Arc::clone(&self.identity);
        let settings = Arc::clone(&self.settings);
        let transfer_port = Arc::clone(&self.transfer_port);
        let port = self.port;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        task::spawn(async move {
            loop {
                let beacon = signed_beacon(
                    &identity,
                    settings.api_port(),
                    transfer_port.load(Ordering::Relaxed),
                );

                match serde_json::to_vec(&beacon) {
                    Ok(data) => {
                        for target in broadcast_targets() {
                            let addr = SocketAddrV4::new(target, port);
                            // Some interfaces refuse broadcast sends
                            let _ = socket.send_to(&data, addr).await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to serialize beacon: {e}");
                    }
                }

                tokio::select! {
                    () = tokio::time::sleep(DISCOVERY_INTERVAL) => {}
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
    }

    fn spawn_recv_loop(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let registry = self.registry.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        task::spawn(async move {
            // Beacons are well under 1500 bytes, but tolerate any datagram
            // up to 64 KiB
            let mut buf = vec![0u8; 65536];
            loop {
                tokio::select! {
                    received = socket.recv_from(&mut buf) => match received {
                        Ok((len, source)) => {
                            registry.handle_packet(&buf[..len], source).await;
                        }
                        Err(e) => {
                            tracing::warn!("Discovery receive error: {e}");
                        }
                    },
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
    }

    fn spawn_cleanup_loop(&self) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        task::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(PEER_TIMEOUT) => {
                        registry.evict_stale().await;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
    }
}

/// Build and sign a beacon carrying only the ephemeral identity.
fn signed_beacon(identity: &DeviceIdentity, api_port: u16, transfer_port: u16) -> Beacon {
    let mut beacon = Beacon {
        app_id: APP_ID.to_string(),
        // The ephemeral id doubles as the wire device_id so the long-term
        // identity is never broadcast
        device_id: identity.public_id().to_string(),
        device_name: identity.alias().to_string(),
        api_port,
        transfer_port,
        platform: platform_name().to_string(),
        alias: identity.alias().to_string(),
        public_id: identity.public_id().to_string(),
        auth_tag: String::new(),
    };
    beacon.auth_tag = hex::encode(identity.sign(&signable_bytes(&beacon)));
    beacon
}

/// All broadcast addresses to announce on: the limited broadcast address
/// plus the directed broadcast of every non-loopback IPv4 interface.
fn broadcast_targets() -> Vec<Ipv4Addr> {
    let mut targets = vec![Ipv4Addr::BROADCAST];

    let Ok(interfaces) = NetworkInterface::show() else {
        return targets;
    };

    for interface in &interfaces {
        for addr in &interface.addr {
            let network_interface::Addr::V4(v4) = addr else {
                continue;
            };
            if v4.ip.is_loopback() {
                continue;
            }

            let directed = v4.broadcast.unwrap_or_else(|| {
                // /24 heuristic when the interface reports no broadcast
                let octets = v4.ip.octets();
                Ipv4Addr::new(octets[0], octets[1], octets[2], 255)
            });

            if directed != Ipv4Addr::BROADCAST && !targets.contains(&directed) {
                targets.push(directed);
            }
        }
    }

    targets
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}
