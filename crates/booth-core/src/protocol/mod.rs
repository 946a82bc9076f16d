//! Wire protocol for transfer connections.
//!
//! Every message on a transfer connection is a length-prefixed TLV frame:
//!
//! ```text
//! ┌────────────┬──────────────────┬─────────────────────┐
//! │    Type    │      Length      │       Payload       │
//! │   1 byte   │ 4 bytes (BE u32) │   (length bytes)    │
//! └────────────┴──────────────────┴─────────────────────┘
//! ```
//!
//! Zero-length payloads are legal (control messages). Readers refuse
//! frames whose declared length exceeds [`MAX_PAYLOAD_SIZE`] before
//! allocating; writers fully flush before returning, so control messages
//! are never stuck behind buffered data.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};

/// Frame header size: type byte plus big-endian u32 length.
pub const HEADER_SIZE: usize = 5;

/// Maximum accepted payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Message types on a transfer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// 32-byte X25519 public key (both directions)
    HandshakePubkey = 0x01,
    /// UTF-8 JSON `FileMetadata` (sender to receiver)
    Metadata = 0x02,
    /// Optional UTF-8 JSON `AcceptPayload` (receiver to sender)
    Accept = 0x03,
    /// Empty (receiver to sender)
    Reject = 0x04,
    /// 8-byte big-endian file offset (receiver to sender)
    ResumeOffset = 0x05,
    /// `nonce || ciphertext || tag` (sender to receiver)
    DataChunk = 0x06,
    /// Empty (either direction)
    Pause = 0x07,
    /// Empty (either direction)
    Resume = 0x08,
    /// Empty (either direction)
    Cancel = 0x09,
    /// Empty (sender to receiver)
    TransferComplete = 0x0A,
}

impl MessageType {
    /// Parse a message type from its wire byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::HandshakePubkey),
            0x02 => Some(Self::Metadata),
            0x03 => Some(Self::Accept),
            0x04 => Some(Self::Reject),
            0x05 => Some(Self::ResumeOffset),
            0x06 => Some(Self::DataChunk),
            0x07 => Some(Self::Pause),
            0x08 => Some(Self::Resume),
            0x09 => Some(Self::Cancel),
            0x0A => Some(Self::TransferComplete),
            _ => None,
        }
    }
}

/// Metadata sent by the sender ahead of file data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Transfer identifier (UUID string)
    pub transfer_id: String,
    /// File name (no directory components)
    pub file_name: String,
    /// Total file size in bytes
    pub file_size: u64,
    /// Sender's device id (ephemeral public id when identity is masked)
    pub sender_device_id: String,
    /// Sender's display name (ephemeral alias when identity is masked)
    pub sender_device_name: String,
    /// Hex Ed25519 public key, empty when no identity proof is offered
    #[serde(default)]
    pub identity_public_key: String,
    /// Hex Ed25519 signature over the UTF-8 transfer id
    #[serde(default)]
    pub identity_signature: String,
}

/// Identity proof the receiver may attach to its `Accept` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptPayload {
    /// Hex Ed25519 public key
    pub identity_public_key: String,
    /// Hex Ed25519 signature over the UTF-8 transfer id
    pub identity_signature: String,
    /// Receiver's real device name
    pub device_name: String,
}

/// Read one message from a stream.
///
/// # Errors
///
/// Returns `Error::Protocol` for unknown message types,
/// `Error::PayloadTooLarge` for oversize frames, and `Error::Io` for
/// truncated reads or connection failures.
pub async fn read_message<R>(reader: &mut R) -> Result<(MessageType, Vec<u8>)>
where
    R: AsyncReadExt + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let message_type = MessageType::from_byte(header[0])
        .ok_or_else(|| Error::Protocol(format!("unknown message type: {:#04x}", header[0])))?;

    let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if length > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge(length));
    }

    let mut payload = vec![0u8; length as usize];
    if length > 0 {
        reader.read_exact(&mut payload).await?;
    }

    Ok((message_type, payload))
}

/// Write one message to a stream, flushing before returning.
///
/// # Errors
///
/// Returns an error if writing fails.
pub async fn write_message<W>(
    writer: &mut W,
    message_type: MessageType,
    payload: &[u8],
) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    #[allow(clippy::cast_possible_truncation)]
    let length = payload.len() as u32;

    let mut header = [0u8; HEADER_SIZE];
    header[0] = message_type as u8;
    header[1..5].copy_from_slice(&length.to_be_bytes());

    writer.write_all(&header).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;

    Ok(())
}

/// Encode a message payload to JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a message payload from JSON bytes.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a resume offset as 8 big-endian bytes.
#[must_use]
pub fn encode_offset(offset: u64) -> [u8; 8] {
    offset.to_be_bytes()
}

/// Decode a resume offset from its wire form.
///
/// # Errors
///
/// Returns an error if the payload is not exactly 8 bytes.
pub fn decode_offset(data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| Error::Protocol(format!("invalid resume offset length: {}", data.len())))?;
    Ok(u64::from_be_bytes(bytes))
}
