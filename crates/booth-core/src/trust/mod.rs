//! Trusted peer persistence and beacon verification.
//!
//! A peer becomes trusted after a completed transfer in which its Ed25519
//! identity proof verified. The store keeps `{device_id, real_name,
//! public_key_hex}` records keyed by the peer's stable device id and uses
//! them to resolve ephemeral beacon aliases back to real names:
//!
//! 1. Peers broadcast beacons under a per-run alias, signed with their
//!    long-term key.
//! 2. On receipt, the signature is checked against every stored public
//!    key; a match resolves the beacon to the stored identity.
//! 3. Unverified beacons still surface as anonymous, untrusted peers.
//!
//! The store is persisted as a JSON object keyed by device id at
//! `trusted_peers.json` in the config directory, rewritten atomically on
//! every change.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::crypto::ed25519_verify;
use crate::discovery::Beacon;
use crate::error::{Error, Result};

/// A peer that has been verified in a previous transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustedPeer {
    /// Stable device identifier
    pub device_id: String,
    /// Real display name learned during the verified transfer
    pub real_name: String,
    /// Hex-encoded Ed25519 public key
    pub public_key_hex: String,
}

/// Persistent store of trusted peers.
#[derive(Debug)]
pub struct TrustStore {
    /// Path to the store file
    path: PathBuf,
    /// Records keyed by stable device id
    peers: HashMap<String, TrustedPeer>,
}

impl TrustStore {
    /// Load the store from a specific path.
    ///
    /// A missing file yields an empty store; a present but unreadable one
    /// is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path,
                peers: HashMap::new(),
            });
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "failed to read trust store at {}: {e}",
                path.display()
            ))
        })?;

        let peers: HashMap<String, TrustedPeer> = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "failed to parse trust store at {}: {e}",
                path.display()
            ))
        })?;

        tracing::info!("Loaded {} trusted peers", peers.len());

        Ok(Self { path, peers })
    }

    /// Persist the store, writing a temp file and renaming it over the
    /// target so readers never observe a partial file.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!(
                    "failed to create trust store directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let content = serde_json::to_string_pretty(&self.peers)
            .map_err(|e| Error::Serialization(format!("failed to serialize trust store: {e}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .map_err(|e| Error::Config(format!("failed to write trust store: {e}")))?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| Error::Config(format!("failed to replace trust store: {e}")))?;

        Ok(())
    }

    /// Insert or replace a trusted peer record and persist the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be saved.
    pub fn add_trusted_peer(
        &mut self,
        device_id: &str,
        real_name: &str,
        public_key_hex: &str,
    ) -> Result<()> {
        self.peers.insert(
            device_id.to_string(),
            TrustedPeer {
                device_id: device_id.to_string(),
                real_name: real_name.to_string(),
                public_key_hex: public_key_hex.to_string(),
            },
        );
        self.save()?;

        tracing::info!("Added trusted peer: {real_name} ({device_id})");
        Ok(())
    }

    /// Look up a known peer by its exact public key.
    #[must_use]
    pub fn get_peer_by_key(&self, public_key_hex: &str) -> Option<&TrustedPeer> {
        self.peers
            .values()
            .find(|p| p.public_key_hex == public_key_hex)
    }

    /// List all trusted peers.
    #[must_use]
    pub fn list(&self) -> Vec<&TrustedPeer> {
        self.peers.values().collect()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Attempt to verify a beacon's `auth_tag` against every stored key.
    ///
    /// Returns the matching record if any stored public key verifies the
    /// signature over the beacon's canonical bytes. A missing or
    /// non-hex tag returns `None`.
    #[must_use]
    pub fn verify_peer(&self, beacon: &Beacon) -> Option<&TrustedPeer> {
        if beacon.auth_tag.is_empty() {
            return None;
        }

        let Ok(sig_bytes) = hex::decode(&beacon.auth_tag) else {
            return None;
        };
        let Ok(signature): std::result::Result<[u8; 64], _> = sig_bytes.try_into() else {
            return None;
        };

        let signable = signable_bytes(beacon);

        self.peers.values().find(|peer| {
            let Ok(key_bytes) = hex::decode(&peer.public_key_hex) else {
                return false;
            };
            let Ok(key): std::result::Result<[u8; 32], _> = key_bytes.try_into() else {
                return false;
            };
            ed25519_verify(&key, &signature, &signable)
        })
    }

    /// Path to the store file.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Canonical byte string a beacon's `auth_tag` signs.
///
/// Covers the ephemeral identity and the advertised ports, so a captured
/// tag cannot be grafted onto a beacon pointing elsewhere.
#[must_use]
pub fn signable_bytes(beacon: &Beacon) -> Vec<u8> {
    format!(
        "{}:{}:{}:{}:{}",
        beacon.app_id, beacon.public_id, beacon.alias, beacon.api_port, beacon.transfer_port
    )
    .into_bytes()
}
