//! Transfer orchestration.
//!
//! The manager owns the receiver listener, the table of all transfers,
//! and the acceptance slots incoming transfers wait on. It spawns one
//! session task per queued send and dispatches every accepted incoming
//! connection into a receive session.
//!
//! User commands (pause/resume/cancel, acceptance decisions) mutate the
//! shared transfer state; the in-session monitors observe those changes
//! and propagate them onto the wire.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use rand::Rng;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::{self, JoinHandle};

use crate::config::Settings;
use crate::crypto::DeviceIdentity;
use crate::error::{Error, Result};
use crate::event::EventBus;
use crate::transfer::session::{self, SessionContext, TransferHost};
use crate::transfer::{TransferDirection, TransferHandle, TransferInfo, TransferState};
use crate::trust::TrustStore;
use crate::{TRANSFER_PORT_MAX, TRANSFER_PORT_MIN};

/// Ports tried before giving up on binding the receiver listener.
const BIND_ATTEMPTS: u32 = 10;

/// Manages all active and completed file transfers.
#[derive(Clone)]
pub struct TransferManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    /// All transfers by id, active and settled
    transfers: StdMutex<HashMap<String, TransferHandle>>,
    /// Session tasks for queued sends
    send_tasks: StdMutex<HashMap<String, JoinHandle<()>>>,
    /// Pending acceptance decisions keyed by transfer id
    accept_slots: StdMutex<HashMap<String, oneshot::Sender<bool>>>,
    /// Listener accept-loop task
    listener_task: StdMutex<Option<JoinHandle<()>>>,
    /// Bound receiver port, `0` until started
    receiver_port: AtomicU16,
    settings: Arc<Settings>,
    identity: Arc<DeviceIdentity>,
    trust: Arc<Mutex<TrustStore>>,
    events: EventBus,
}

impl std::fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager")
            .field(
                "receiver_port",
                &self.inner.receiver_port.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

impl TransferManager {
    /// Create a manager; call [`start`](Self::start) to bind the listener.
    #[must_use]
    pub fn new(
        settings: Arc<Settings>,
        identity: Arc<DeviceIdentity>,
        trust: Arc<Mutex<TrustStore>>,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                transfers: StdMutex::new(HashMap::new()),
                send_tasks: StdMutex::new(HashMap::new()),
                accept_slots: StdMutex::new(HashMap::new()),
                listener_task: StdMutex::new(None),
                receiver_port: AtomicU16::new(0),
                settings,
                identity,
                trust,
                events,
            }),
        }
    }

    /// Bind the receiver listener on a random port in the transfer range
    /// and start accepting incoming connections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoTransferPort`] when no port in the range could
    /// be bound after the retry budget.
    pub async fn start(&self, device_name: &str) -> Result<()> {
        self.inner.settings.set_device_name(device_name);

        let mut listener = None;
        for _ in 0..BIND_ATTEMPTS {
            let port = rand::thread_rng().gen_range(TRANSFER_PORT_MIN..=TRANSFER_PORT_MAX);
            match TcpListener::bind(("0.0.0.0", port)).await {
                Ok(bound) => {
                    listener = Some((bound, port));
                    break;
                }
                Err(e) => {
                    tracing::debug!("Transfer port {port} unavailable: {e}");
                }
            }
        }

        let Some((listener, port)) = listener else {
            return Err(Error::NoTransferPort {
                min: TRANSFER_PORT_MIN,
                max: TRANSFER_PORT_MAX,
                attempts: BIND_ATTEMPTS,
            });
        };

        self.inner.receiver_port.store(port, Ordering::Relaxed);
        tracing::info!("Transfer receiver listening on port {port}");

        let inner = Arc::clone(&self.inner);
        let accept_loop = task::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        tracing::info!("Incoming transfer connection from {peer_addr}");
                        let host: Arc<dyn TransferHost> = Arc::clone(&inner) as Arc<dyn TransferHost>;
                        task::spawn(session::receive_file(
                            stream,
                            inner.session_context(),
                            inner.settings.save_dir(),
                            inner.settings.device_name(),
                            host,
                        ));
                    }
                    Err(e) => {
                        tracing::warn!("Failed to accept transfer connection: {e}");
                    }
                }
            }
        });

        *self.inner.lock_listener() = Some(accept_loop);
        Ok(())
    }

    /// Port the receiver listener is bound to, `0` before `start`.
    #[must_use]
    pub fn receiver_port(&self) -> u16 {
        self.inner.receiver_port.load(Ordering::Relaxed)
    }

    /// Queue one send per file path and spawn their session tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if any path cannot be inspected.
    pub async fn queue_send(
        &self,
        peer_ip: IpAddr,
        peer_port: u16,
        peer_device_id: &str,
        peer_device_name: &str,
        file_paths: &[PathBuf],
    ) -> Result<Vec<TransferInfo>> {
        let mut infos = Vec::with_capacity(file_paths.len());

        for path in file_paths {
            let metadata = tokio::fs::metadata(path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::FileNotFound(path.display().to_string())
                } else {
                    Error::Io(e)
                }
            })?;

            let file_name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string());

            let transfer_id = uuid::Uuid::new_v4().to_string();
            let info = TransferInfo::new(
                transfer_id.clone(),
                file_name,
                metadata.len(),
                TransferDirection::Sending,
                peer_device_id.to_string(),
                peer_device_name.to_string(),
            );
            let handle = TransferHandle::new(info);

            self.inner
                .lock_transfers()
                .insert(transfer_id.clone(), handle.clone());

            let inner = Arc::clone(&self.inner);
            let session_handle = handle.clone();
            let session_path = path.clone();
            let task_id = transfer_id.clone();
            let addr = SocketAddr::new(peer_ip, peer_port);
            let ctx = self.inner.session_context();

            let send_task = task::spawn(async move {
                session::send_file(addr, session_path, session_handle, ctx).await;
                inner.lock_send_tasks().remove(&task_id);
            });
            self.inner
                .lock_send_tasks()
                .insert(transfer_id, send_task);

            let snapshot = handle.snapshot();
            self.inner.events.transfer_state(&snapshot);
            infos.push(snapshot);
        }

        Ok(infos)
    }

    /// Resolve a pending acceptance prompt.
    pub fn respond_to_request(&self, transfer_id: &str, accept: bool) {
        let slot = self.inner.lock_accept_slots().remove(transfer_id);
        if let Some(slot) = slot {
            let _ = slot.send(accept);
        } else {
            tracing::debug!("No pending acceptance for transfer {transfer_id}");
        }
    }

    /// Pause an actively transferring file.
    pub fn pause_transfer(&self, transfer_id: &str) {
        if let Some(handle) = self.get_handle(transfer_id) {
            if handle.state() == TransferState::Transferring
                && handle.set_state(TransferState::Paused)
            {
                self.inner.events.transfer_state(&handle.snapshot());
            }
        }
    }

    /// Resume a locally paused transfer.
    pub fn resume_transfer(&self, transfer_id: &str) {
        if let Some(handle) = self.get_handle(transfer_id) {
            if handle.state() == TransferState::Paused
                && handle.set_state(TransferState::Transferring)
            {
                self.inner.events.transfer_state(&handle.snapshot());
            }
        }
    }

    /// Cancel a transfer in any non-terminal state.
    pub fn cancel_transfer(&self, transfer_id: &str) {
        let Some(handle) = self.get_handle(transfer_id) else {
            return;
        };

        if !matches!(
            handle.state(),
            TransferState::Pending
                | TransferState::AwaitingAcceptance
                | TransferState::Connecting
                | TransferState::Transferring
                | TransferState::Paused
                | TransferState::PausedByPeer
        ) {
            return;
        }

        if handle.set_state(TransferState::Cancelled) {
            self.inner.events.transfer_state(&handle.snapshot());
        }

        // An unanswered acceptance prompt resolves as a rejection so the
        // session is not left waiting out the full prompt timeout.
        let slot = self.inner.lock_accept_slots().remove(transfer_id);
        if let Some(slot) = slot {
            let _ = slot.send(false);
        }

        let send_task = self.inner.lock_send_tasks().remove(transfer_id);
        if let Some(task) = send_task {
            task.abort();
        }
    }

    /// Snapshot all known transfers.
    #[must_use]
    pub fn transfers(&self) -> Vec<TransferInfo> {
        let handles: Vec<TransferHandle> =
            self.inner.lock_transfers().values().cloned().collect();
        handles.iter().map(TransferHandle::snapshot).collect()
    }

    /// Snapshot one transfer by id.
    #[must_use]
    pub fn get_transfer(&self, transfer_id: &str) -> Option<TransferInfo> {
        self.get_handle(transfer_id).map(|h| h.snapshot())
    }

    /// Stop the listener and abort all active send tasks.
    pub fn stop(&self) {
        for (_, task) in self.inner.lock_send_tasks().drain() {
            task.abort();
        }

        if let Some(task) = self.inner.lock_listener().take() {
            task.abort();
        }

        tracing::info!("Transfer manager stopped");
    }

    fn get_handle(&self, transfer_id: &str) -> Option<TransferHandle> {
        self.inner.lock_transfers().get(transfer_id).cloned()
    }
}

impl ManagerInner {
    fn session_context(&self) -> SessionContext {
        SessionContext {
            identity: Arc::clone(&self.identity),
            trust: Arc::clone(&self.trust),
            events: self.events.clone(),
        }
    }

    fn lock_transfers(&self) -> std::sync::MutexGuard<'_, HashMap<String, TransferHandle>> {
        self.transfers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_send_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.send_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_accept_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<bool>>>
    {
        self.accept_slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl TransferHost for ManagerInner {
    fn register(&self, handle: &TransferHandle) {
        self.lock_transfers()
            .insert(handle.transfer_id(), handle.clone());
    }

    fn request_acceptance(&self, info: &TransferInfo) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();

        {
            let mut slots = self.lock_accept_slots();
            slots.retain(|_, slot| !slot.is_closed());
            slots.insert(info.transfer_id.clone(), tx);
        }

        self.events.transfer_request(info);
        rx
    }
}
