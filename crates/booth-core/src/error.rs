//! Error types for Transfer Booth.
//!
//! This module provides a unified error type for all Transfer Booth
//! operations, with specific error variants for different failure modes.
//!
//! Errors are contained per connection: a failing transfer session marks
//! itself failed and never propagates into the manager task or other
//! transfers. Cancellation is not represented as an error; sessions observe
//! it through transfer state.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for Transfer Booth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Transfer Booth.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid protocol message (malformed payload, truncated read)
    #[error("invalid protocol message: {0}")]
    Protocol(String),

    /// Unexpected message type
    #[error("unexpected message type: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Expected message type
        expected: String,
        /// Actual message type received
        actual: String,
    },

    /// Frame length exceeds the protocol ceiling
    #[error("frame payload too large: {0} bytes")]
    PayloadTooLarge(u32),

    /// Cryptographic failure (key decode, AES-GCM tag mismatch)
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Signature verification failed
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Transfer rejected by the receiver (or acceptance timed out)
    #[error("transfer rejected by receiver")]
    TransferRejected,

    /// Transfer was cancelled
    #[error("transfer cancelled")]
    TransferCancelled,

    /// Operation timeout
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    /// No transfer port could be bound
    #[error("unable to bind a transfer port in {min}-{max} after {attempts} attempts")]
    NoTransferPort {
        /// Range start
        min: u16,
        /// Range end
        max: u16,
        /// Ports tried
        attempts: u32,
    },

    /// File not found
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Configuration or persistent state error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error represents a deliberate peer decision rather
    /// than a fault (rejections and cancellations are surfaced as state
    /// transitions, not failures).
    #[must_use]
    pub const fn is_peer_decision(&self) -> bool {
        matches!(self, Self::TransferRejected | Self::TransferCancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_peer_decision_classification() {
        assert!(Error::TransferRejected.is_peer_decision());
        assert!(Error::TransferCancelled.is_peer_decision());
        assert!(!Error::SignatureInvalid.is_peer_decision());
        assert!(!Error::Protocol("bad".into()).is_peer_decision());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::UnexpectedMessage {
            expected: "Accept".to_string(),
            actual: "DataChunk".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected message type: expected Accept, got DataChunk"
        );

        assert_eq!(
            Error::PayloadTooLarge(20_000_000).to_string(),
            "frame payload too large: 20000000 bytes"
        );
    }
}
