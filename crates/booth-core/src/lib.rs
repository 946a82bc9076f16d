//! # Transfer Booth Core Library
//!
//! `booth-core` provides the core functionality for Transfer Booth, a
//! peer-to-peer file transfer tool for devices on a shared local network.
//!
//! ## Features
//!
//! - **LAN discovery**: Periodic signed UDP beacons with a liveness-bounded
//!   peer table
//! - **Secure transfers**: Ephemeral X25519 key exchange and AES-256-GCM
//!   per-chunk encryption over TCP
//! - **Transfer control**: Pause, resume and cancel from either side, plus
//!   resumption from partial files
//! - **Identity and trust**: Long-term Ed25519 device identity, ephemeral
//!   per-run aliases, and a persistent trust store
//!
//! ## Modules
//!
//! - [`config`] - Settings, config directory and the persistent device id
//! - [`crypto`] - Cryptographic primitives and the device identity
//! - [`discovery`] - Beacon broadcasting and peer tracking
//! - [`event`] - Event fan-out to registered consumers
//! - [`node`] - Top-level service wiring and lifecycle
//! - [`protocol`] - Length-prefixed wire protocol
//! - [`transfer`] - Transfer sessions and orchestration
//! - [`trust`] - Trusted peer persistence and beacon verification
//!
//! ## Example
//!
//! ```rust,ignore
//! use booth_core::{config::Settings, node::Node};
//!
//! let settings = Settings::new()?;
//! let node = Node::start(settings).await?;
//! // ... register event sinks, queue transfers ...
//! node.stop().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod event;
pub mod node;
pub mod protocol;
pub mod transfer;
pub mod trust;

pub use error::{Error, Result};

use std::time::Duration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application identifier carried in every discovery beacon.
pub const APP_ID: &str = "transfer-booth-v1";

/// Discovery port (UDP), shared by all instances on the LAN.
pub const DISCOVERY_PORT: u16 = 41234;

/// Interval between discovery beacon broadcasts.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(3);

/// Peers not refreshed within this window are evicted from the peer table.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// Transfer port range start.
pub const TRANSFER_PORT_MIN: u16 = 50000;

/// Transfer port range end.
pub const TRANSFER_PORT_MAX: u16 = 65000;

/// Plaintext bytes per encrypted data chunk (128 KiB).
pub const CHUNK_SIZE: usize = 131_072;

/// How long the receiver waits for the user to accept an incoming transfer.
pub const ACCEPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default port of the external API adapter, advertised in beacons.
pub const DEFAULT_API_PORT: u16 = 8765;
