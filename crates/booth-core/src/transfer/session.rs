//! Sender and receiver transfer sessions.
//!
//! A session owns one TCP connection end-to-end and drives the wire
//! protocol against it:
//!
//! 1. Ephemeral X25519 handshake, session key derivation
//! 2. Metadata exchange and the receiver-side acceptance prompt
//! 3. Resume offset negotiation from any partial file
//! 4. Encrypted chunk stream with interleaved control messages
//!
//! While chunks flow, the sender runs a **control-reader** task on the
//! read half of its connection mapping incoming PAUSE/RESUME/CANCEL into
//! state changes, and the receiver runs a **local-state monitor** on its
//! write half translating locally requested state changes into control
//! messages. Reads and writes on the split TCP stream are independent,
//! so the auxiliary task never contends with the data path.
//!
//! Errors are contained here: a failing session marks itself `FAILED`
//! (unless already terminal), closes the connection and stops its
//! auxiliary task. Nothing propagates to other transfers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task;
use tokio::time::{sleep, timeout};

use crate::crypto::{self, DeviceIdentity, KEY_SIZE};
use crate::error::{Error, Result};
use crate::event::EventBus;
use crate::protocol::{self, AcceptPayload, FileMetadata, MessageType};
use crate::transfer::{SpeedTracker, TransferHandle, TransferState};
use crate::trust::TrustStore;
use crate::{ACCEPT_TIMEOUT, CHUNK_SIZE};

/// Progress events are throttled to one per this interval.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Poll interval for pause waits and the local-state monitor.
const STATE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared dependencies of both session directions.
#[derive(Clone)]
pub struct SessionContext {
    /// Local device identity for signing transfer ids
    pub identity: Arc<DeviceIdentity>,
    /// Trust store for identity resolution and post-transfer promotion
    pub trust: Arc<Mutex<TrustStore>>,
    /// Event bus for state and progress emission
    pub events: EventBus,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext").finish_non_exhaustive()
    }
}

/// Hook the receiver session uses to hand incoming transfers to their
/// orchestrator.
pub trait TransferHost: Send + Sync {
    /// Track an incoming transfer so it can be observed and controlled.
    fn register(&self, handle: &TransferHandle);

    /// Ask the user whether to accept. The returned channel resolves when
    /// the user decides; dropping it counts as rejection.
    fn request_acceptance(&self, info: &crate::transfer::TransferInfo) -> oneshot::Receiver<bool>;
}

/// Identity details staged during a session and committed to the trust
/// store only once the transfer completes.
struct PendingTrust {
    device_id: String,
    real_name: String,
    public_key_hex: String,
}

enum ChunkLoopOutcome {
    Completed,
    Cancelled,
}

/// Send a single file to a peer.
///
/// Drives the full sender state machine; all failures are absorbed into
/// the transfer state and events.
pub async fn send_file(
    peer_addr: std::net::SocketAddr,
    file_path: PathBuf,
    handle: TransferHandle,
    ctx: SessionContext,
) {
    if let Err(e) = run_sender(peer_addr, &file_path, &handle, &ctx).await {
        tracing::error!(
            "Send error for '{}': {e}",
            handle.snapshot().file_name
        );
        if handle.fail(&e.to_string()) {
            ctx.events.transfer_state(&handle.snapshot());
        }
    }
}

async fn run_sender(
    peer_addr: std::net::SocketAddr,
    file_path: &Path,
    handle: &TransferHandle,
    ctx: &SessionContext,
) -> Result<()> {
    if handle.set_state(TransferState::Connecting) {
        ctx.events.transfer_state(&handle.snapshot());
    }

    let stream = TcpStream::connect(peer_addr).await?;
    let (mut reader, mut writer) = stream.into_split();

    let session_key = handshake_sender(&mut reader, &mut writer).await?;

    let info = handle.snapshot();
    let metadata = FileMetadata {
        transfer_id: info.transfer_id.clone(),
        file_name: info.file_name.clone(),
        file_size: info.file_size,
        sender_device_id: ctx.identity.public_id().to_string(),
        sender_device_name: ctx.identity.alias().to_string(),
        identity_public_key: ctx.identity.public_key_hex(),
        identity_signature: hex::encode(ctx.identity.sign(info.transfer_id.as_bytes())),
    };
    protocol::write_message(&mut writer, MessageType::Metadata, &protocol::encode_payload(&metadata)?)
        .await?;

    let (message_type, payload) = protocol::read_message(&mut reader).await?;
    let pending_trust = match message_type {
        MessageType::Reject => {
            if handle.set_state(TransferState::Rejected) {
                ctx.events.transfer_state(&handle.snapshot());
            }
            return Ok(());
        }
        MessageType::Accept => verify_accept_payload(&payload, handle, ctx),
        other => {
            return Err(Error::UnexpectedMessage {
                expected: "Accept or Reject".to_string(),
                actual: format!("{other:?}"),
            });
        }
    };

    let (message_type, payload) = protocol::read_message(&mut reader).await?;
    if message_type != MessageType::ResumeOffset {
        return Err(Error::UnexpectedMessage {
            expected: "ResumeOffset".to_string(),
            actual: format!("{message_type:?}"),
        });
    }
    let offset = protocol::decode_offset(&payload)?;

    handle.set_transferred(offset);
    if handle.set_state(TransferState::Transferring) {
        ctx.events.transfer_state(&handle.snapshot());
    }

    let monitor = task::spawn(monitor_remote_commands(
        reader,
        handle.clone(),
        ctx.events.clone(),
    ));

    let outcome = send_chunks(
        &mut writer,
        file_path,
        offset,
        session_key,
        handle,
        &ctx.events,
    )
    .await;
    monitor.abort();

    match outcome? {
        ChunkLoopOutcome::Cancelled => Ok(()),
        ChunkLoopOutcome::Completed => {
            if let Some(pending) = pending_trust {
                commit_trust(ctx, &pending).await;
            }
            if handle.complete() {
                ctx.events.transfer_state(&handle.snapshot());
            }
            Ok(())
        }
    }
}

/// Verify the receiver's identity proof carried in a non-empty ACCEPT
/// payload. Verification failures only forfeit trust promotion.
fn verify_accept_payload(
    payload: &[u8],
    handle: &TransferHandle,
    ctx: &SessionContext,
) -> Option<PendingTrust> {
    if payload.is_empty() {
        return None;
    }

    let accept: AcceptPayload = match protocol::decode_payload(payload) {
        Ok(accept) => accept,
        Err(e) => {
            tracing::warn!("Failed to parse receiver identity payload: {e}");
            return None;
        }
    };

    let transfer_id = handle.transfer_id();
    if !crypto::ed25519_verify_hex(
        &accept.identity_public_key,
        &accept.identity_signature,
        transfer_id.as_bytes(),
    ) {
        tracing::warn!("Failed to verify receiver identity for transfer {transfer_id}");
        return None;
    }

    handle.set_peer_name(&accept.device_name);
    ctx.events.transfer_state(&handle.snapshot());

    Some(PendingTrust {
        device_id: handle.snapshot().peer_device_id,
        real_name: accept.device_name,
        public_key_hex: accept.identity_public_key,
    })
}

#[allow(clippy::cast_possible_truncation)]
async fn send_chunks(
    writer: &mut OwnedWriteHalf,
    file_path: &Path,
    offset: u64,
    session_key: [u8; KEY_SIZE],
    handle: &TransferHandle,
    events: &EventBus,
) -> Result<ChunkLoopOutcome> {
    let mut file = fs::File::open(file_path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(file_path.display().to_string())
        } else {
            Error::Io(e)
        }
    })?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;

    let mut tracker = SpeedTracker::new();
    let mut last_progress = Instant::now();

    loop {
        let state = handle.state();
        if state == TransferState::Cancelled {
            protocol::write_message(writer, MessageType::Cancel, &[]).await?;
            return Ok(ChunkLoopOutcome::Cancelled);
        }
        if state.is_paused() {
            let paused_locally = state == TransferState::Paused;
            if paused_locally {
                protocol::write_message(writer, MessageType::Pause, &[]).await?;
            }

            while handle.state().is_paused() {
                sleep(STATE_POLL_INTERVAL).await;
            }

            match handle.state() {
                TransferState::Cancelled => {
                    protocol::write_message(writer, MessageType::Cancel, &[]).await?;
                    return Ok(ChunkLoopOutcome::Cancelled);
                }
                TransferState::Transferring if paused_locally => {
                    protocol::write_message(writer, MessageType::Resume, &[]).await?;
                }
                _ => {}
            }
        }

        let mut chunk = vec![0u8; CHUNK_SIZE];
        let read = read_up_to(&mut file, &mut chunk).await?;
        if read == 0 {
            break;
        }
        chunk.truncate(read);

        let sealed = task::spawn_blocking(move || crypto::encrypt_chunk(&session_key, &chunk))
            .await
            .map_err(|e| Error::Crypto(format!("encryption task failed: {e}")))??;
        protocol::write_message(writer, MessageType::DataChunk, &sealed).await?;

        handle.add_transferred(read as u64);
        tracker.record(read as u64);

        if last_progress.elapsed() >= PROGRESS_INTERVAL {
            events.transfer_progress(&handle.update_progress(tracker.speed_bps()));
            last_progress = Instant::now();
        }
    }

    protocol::write_message(writer, MessageType::TransferComplete, &[]).await?;
    Ok(ChunkLoopOutcome::Completed)
}

/// Sender-side control reader: maps the receiver's PAUSE/RESUME/CANCEL
/// into state changes while the send loop owns the write half.
async fn monitor_remote_commands(
    mut reader: OwnedReadHalf,
    handle: TransferHandle,
    events: EventBus,
) {
    while !handle.state().is_terminal() {
        let Ok((message_type, _)) = protocol::read_message(&mut reader).await else {
            break;
        };

        match message_type {
            MessageType::Pause => {
                tracing::info!("Peer paused transfer {}", handle.transfer_id());
                if handle.set_state(TransferState::PausedByPeer) {
                    events.transfer_state(&handle.snapshot());
                }
            }
            MessageType::Resume => {
                tracing::info!("Peer resumed transfer {}", handle.transfer_id());
                if handle.set_state(TransferState::Transferring) {
                    events.transfer_state(&handle.snapshot());
                }
            }
            MessageType::Cancel => {
                tracing::info!("Peer cancelled transfer {}", handle.transfer_id());
                if handle.set_state(TransferState::Cancelled) {
                    events.transfer_state(&handle.snapshot());
                }
                return;
            }
            _ => {}
        }
    }
}

/// Handle one incoming transfer connection end-to-end.
///
/// Drives the full receiver state machine; all failures are absorbed
/// into the transfer state and events.
pub async fn receive_file(
    stream: TcpStream,
    ctx: SessionContext,
    save_dir: PathBuf,
    device_name: String,
    host: Arc<dyn TransferHost>,
) {
    let mut registered = None;
    if let Err(e) = run_receiver(stream, &ctx, &save_dir, &device_name, &host, &mut registered).await
    {
        tracing::error!("Receive error: {e}");
        if let Some(handle) = registered {
            if handle.fail(&e.to_string()) {
                ctx.events.transfer_state(&handle.snapshot());
            }
        }
    }
}

#[allow(clippy::too_many_lines)]
async fn run_receiver(
    stream: TcpStream,
    ctx: &SessionContext,
    save_dir: &Path,
    device_name: &str,
    host: &Arc<dyn TransferHost>,
    registered: &mut Option<TransferHandle>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    let session_key = handshake_receiver(&mut reader, &mut writer).await?;

    let (message_type, payload) = protocol::read_message(&mut reader).await?;
    if message_type != MessageType::Metadata {
        return Err(Error::UnexpectedMessage {
            expected: "Metadata".to_string(),
            actual: format!("{message_type:?}"),
        });
    }
    let metadata: FileMetadata = protocol::decode_payload(&payload)?;

    let (pending_trust, resolved_name) = verify_sender_identity(ctx, &metadata).await;

    let mut info = crate::transfer::TransferInfo::new(
        metadata.transfer_id.clone(),
        metadata.file_name.clone(),
        metadata.file_size,
        crate::transfer::TransferDirection::Receiving,
        metadata.sender_device_id.clone(),
        resolved_name,
    );
    info.state = TransferState::AwaitingAcceptance;

    let handle = TransferHandle::new(info);
    host.register(&handle);
    *registered = Some(handle.clone());
    ctx.events.transfer_state(&handle.snapshot());

    let decision = host.request_acceptance(&handle.snapshot());
    let accepted = matches!(timeout(ACCEPT_TIMEOUT, decision).await, Ok(Ok(true)));

    if !accepted || handle.state().is_terminal() {
        tracing::info!(
            "Transfer {} not accepted (timeout, rejection or cancellation)",
            metadata.transfer_id
        );
        protocol::write_message(&mut writer, MessageType::Reject, &[]).await?;
        if handle.set_state(TransferState::Rejected) {
            ctx.events.transfer_state(&handle.snapshot());
        }
        return Ok(());
    }

    let accept = AcceptPayload {
        identity_public_key: ctx.identity.public_key_hex(),
        identity_signature: hex::encode(ctx.identity.sign(metadata.transfer_id.as_bytes())),
        device_name: device_name.to_string(),
    };
    protocol::write_message(&mut writer, MessageType::Accept, &protocol::encode_payload(&accept)?)
        .await?;

    // Resume from any partial file already in the save directory. Only the
    // final path component of the advertised name is honored.
    let file_name = Path::new(&metadata.file_name)
        .file_name()
        .map_or_else(|| metadata.file_name.clone(), |n| n.to_string_lossy().to_string());
    let file_path = save_dir.join(&file_name);
    let offset = fs::metadata(&file_path).await.map_or(0, |m| m.len());

    protocol::write_message(
        &mut writer,
        MessageType::ResumeOffset,
        &protocol::encode_offset(offset),
    )
    .await?;

    handle.set_transferred(offset);
    if handle.set_state(TransferState::Transferring) {
        ctx.events.transfer_state(&handle.snapshot());
    }

    let mut file = if offset > 0 {
        fs::OpenOptions::new().append(true).open(&file_path).await?
    } else {
        fs::File::create(&file_path).await?
    };

    let monitor = task::spawn(monitor_local_state(writer, handle.clone()));

    let outcome = receive_chunks(&mut reader, &mut file, session_key, &handle, &ctx.events).await;
    monitor.abort();

    match outcome? {
        ChunkLoopOutcome::Cancelled => Ok(()),
        ChunkLoopOutcome::Completed => {
            if let Some(pending) = pending_trust {
                commit_trust(ctx, &pending).await;
            }
            if handle.complete() {
                ctx.events.transfer_state(&handle.snapshot());
            }
            Ok(())
        }
    }
}

/// Verify the sender's identity proof from transfer metadata, resolving
/// the display name through the trust store when the key is known.
async fn verify_sender_identity(
    ctx: &SessionContext,
    metadata: &FileMetadata,
) -> (Option<PendingTrust>, String) {
    let mut resolved_name = metadata.sender_device_name.clone();

    if metadata.identity_public_key.is_empty() || metadata.identity_signature.is_empty() {
        return (None, resolved_name);
    }

    if !crypto::ed25519_verify_hex(
        &metadata.identity_public_key,
        &metadata.identity_signature,
        metadata.transfer_id.as_bytes(),
    ) {
        tracing::warn!(
            "Failed to verify sender identity for transfer {}",
            metadata.transfer_id
        );
        return (None, resolved_name);
    }

    let trust = ctx.trust.lock().await;
    if let Some(known) = trust.get_peer_by_key(&metadata.identity_public_key) {
        resolved_name = known.real_name.clone();
    }

    let pending = PendingTrust {
        device_id: metadata.sender_device_id.clone(),
        real_name: resolved_name.clone(),
        public_key_hex: metadata.identity_public_key.clone(),
    };
    (Some(pending), resolved_name)
}

#[allow(clippy::cast_possible_truncation)]
async fn receive_chunks(
    reader: &mut OwnedReadHalf,
    file: &mut fs::File,
    session_key: [u8; KEY_SIZE],
    handle: &TransferHandle,
    events: &EventBus,
) -> Result<ChunkLoopOutcome> {
    let mut tracker = SpeedTracker::new();
    let mut last_progress = Instant::now();

    loop {
        if handle.state() == TransferState::Cancelled {
            return Ok(ChunkLoopOutcome::Cancelled);
        }

        let read = protocol::read_message(reader).await;
        let (message_type, payload) = match read {
            Ok(message) => message,
            // A local cancel closes the exchange from our side; the read
            // failing afterwards is not an error.
            Err(_) if handle.state() == TransferState::Cancelled => {
                return Ok(ChunkLoopOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        };

        match message_type {
            MessageType::TransferComplete => break,
            MessageType::Cancel => {
                if handle.set_state(TransferState::Cancelled) {
                    events.transfer_state(&handle.snapshot());
                }
                return Ok(ChunkLoopOutcome::Cancelled);
            }
            MessageType::Pause => {
                if handle.set_state(TransferState::PausedByPeer) {
                    events.transfer_state(&handle.snapshot());
                }
            }
            MessageType::Resume => {
                if handle.set_state(TransferState::Transferring) {
                    events.transfer_state(&handle.snapshot());
                }
            }
            MessageType::DataChunk => {
                let plaintext =
                    task::spawn_blocking(move || crypto::decrypt_chunk(&session_key, &payload))
                        .await
                        .map_err(|e| Error::Crypto(format!("decryption task failed: {e}")))??;

                file.write_all(&plaintext).await?;
                file.flush().await?;

                handle.add_transferred(plaintext.len() as u64);
                tracker.record(plaintext.len() as u64);

                if last_progress.elapsed() >= PROGRESS_INTERVAL {
                    events.transfer_progress(&handle.update_progress(tracker.speed_bps()));
                    last_progress = Instant::now();
                }
            }
            other => {
                tracing::warn!("Unexpected message type during receive: {other:?}");
            }
        }
    }

    Ok(ChunkLoopOutcome::Completed)
}

/// Receiver-side monitor: translates locally requested state changes
/// (pause/resume/cancel from the UI) into control messages on the wire.
async fn monitor_local_state(mut writer: OwnedWriteHalf, handle: TransferHandle) {
    let mut last_state = handle.state();

    loop {
        let current = handle.state();

        if current == TransferState::Cancelled {
            if let Err(e) = protocol::write_message(&mut writer, MessageType::Cancel, &[]).await {
                tracing::debug!("Failed to send CANCEL: {e}");
            }
            return;
        }
        if current.is_terminal() {
            return;
        }

        if current != last_state {
            let result = match (last_state, current) {
                (TransferState::Transferring, TransferState::Paused) => {
                    tracing::info!("Pausing transfer {}", handle.transfer_id());
                    protocol::write_message(&mut writer, MessageType::Pause, &[]).await
                }
                (TransferState::Paused, TransferState::Transferring) => {
                    tracing::info!("Resuming transfer {}", handle.transfer_id());
                    protocol::write_message(&mut writer, MessageType::Resume, &[]).await
                }
                _ => Ok(()),
            };
            if let Err(e) = result {
                tracing::debug!("Local state monitor write failed: {e}");
                return;
            }
            last_state = current;
        }

        sleep(STATE_POLL_INTERVAL).await;
    }
}

async fn commit_trust(ctx: &SessionContext, pending: &PendingTrust) {
    let mut trust = ctx.trust.lock().await;
    if let Err(e) = trust.add_trusted_peer(
        &pending.device_id,
        &pending.real_name,
        &pending.public_key_hex,
    ) {
        tracing::warn!("Failed to persist trusted peer {}: {e}", pending.device_id);
    }
}

/// Perform the X25519 handshake as the initiating sender.
async fn handshake_sender<R, W>(reader: &mut R, writer: &mut W) -> Result<[u8; KEY_SIZE]>
where
    R: AsyncReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    let (secret, public) = crypto::generate_keypair();
    protocol::write_message(writer, MessageType::HandshakePubkey, &public).await?;

    let peer_public = read_handshake_key(reader).await?;
    crypto::derive_session_key(&secret, &peer_public)
}

/// Perform the X25519 handshake as the receiver.
async fn handshake_receiver<R, W>(reader: &mut R, writer: &mut W) -> Result<[u8; KEY_SIZE]>
where
    R: AsyncReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    let (secret, public) = crypto::generate_keypair();

    let peer_public = read_handshake_key(reader).await?;
    protocol::write_message(writer, MessageType::HandshakePubkey, &public).await?;

    crypto::derive_session_key(&secret, &peer_public)
}

async fn read_handshake_key<R>(reader: &mut R) -> Result<[u8; 32]>
where
    R: AsyncReadExt + Unpin,
{
    let (message_type, payload) = protocol::read_message(reader).await?;
    if message_type != MessageType::HandshakePubkey {
        return Err(Error::UnexpectedMessage {
            expected: "HandshakePubkey".to_string(),
            actual: format!("{message_type:?}"),
        });
    }

    payload
        .try_into()
        .map_err(|_| Error::Crypto("invalid handshake public key length".to_string()))
}

/// Read up to `buf.len()` bytes, stopping early only at end of file.
async fn read_up_to(file: &mut fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handshake_derives_matching_keys() {
        let (client, server) = tokio::io::duplex(1024);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        let sender = tokio::spawn(async move {
            handshake_sender(&mut client_read, &mut client_write)
                .await
                .expect("sender handshake")
        });
        let receiver = tokio::spawn(async move {
            handshake_receiver(&mut server_read, &mut server_write)
                .await
                .expect("receiver handshake")
        });

        let sender_key = sender.await.expect("sender task");
        let receiver_key = receiver.await.expect("receiver task");

        assert_eq!(sender_key, receiver_key);
    }

    #[tokio::test]
    async fn test_handshake_rejects_wrong_message() {
        let (client, server) = tokio::io::duplex(1024);
        let (_client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        protocol::write_message(&mut client_write, MessageType::Pause, &[])
            .await
            .expect("write");

        let result = handshake_receiver(&mut server_read, &mut server_write).await;
        assert!(matches!(result, Err(Error::UnexpectedMessage { .. })));
    }

    #[tokio::test]
    async fn test_handshake_rejects_short_key() {
        let (client, server) = tokio::io::duplex(1024);
        let (_client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        protocol::write_message(&mut client_write, MessageType::HandshakePubkey, &[0u8; 16])
            .await
            .expect("write");

        let result = handshake_receiver(&mut server_read, &mut server_write).await;
        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[tokio::test]
    async fn test_read_up_to_fills_across_short_reads() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("data.bin");
        tokio::fs::write(&path, vec![7u8; 1000]).await.expect("write");

        let mut file = fs::File::open(&path).await.expect("open");
        let mut buf = vec![0u8; 600];
        assert_eq!(read_up_to(&mut file, &mut buf).await.expect("read"), 600);
        let mut rest = vec![0u8; 600];
        assert_eq!(read_up_to(&mut file, &mut rest).await.expect("read"), 400);
        assert_eq!(read_up_to(&mut file, &mut rest).await.expect("read"), 0);
    }
}
