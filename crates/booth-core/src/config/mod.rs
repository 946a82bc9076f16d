//! Configuration and persistent state locations for Transfer Booth.
//!
//! This module owns the settings the external adapters (API, CLI, GUI)
//! mutate at runtime (the device display name and the save directory),
//! plus the config directory holding the persistent state files:
//!
//! | File | Contents |
//! |------|----------|
//! | `device_id` | 36-byte textual UUID, stable across runs |
//! | `identity.key` | Unencrypted PKCS#8 PEM Ed25519 private key |
//! | `trusted_peers.json` | Trust store keyed by device id |
//!
//! ## Config Directory Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/transferbooth` |
//! | macOS | `~/Library/Application Support/TransferBooth` |
//! | Windows | `%APPDATA%\TransferBooth\config` |

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Runtime settings consumed by the core services.
///
/// `device_name` and `save_dir` are mutable at runtime; the remaining
/// fields are fixed for the lifetime of the process.
#[derive(Debug)]
pub struct Settings {
    /// Display name broadcast to trusted peers
    device_name: RwLock<String>,
    /// Directory received files are written to
    save_dir: RwLock<PathBuf>,
    /// Port of the external API adapter, advertised in beacons
    api_port: u16,
    /// Config directory for persistent state
    config_dir: PathBuf,
    /// Stable device identifier, persisted in the config directory
    device_id: String,
}

impl Settings {
    /// Create settings rooted at the platform config directory.
    ///
    /// The config directory and the default save directory are created if
    /// missing; the stable device id is loaded or minted on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined or
    /// created, or if the device id file cannot be read or written.
    pub fn new() -> Result<Self> {
        let config_dir = default_config_dir()
            .ok_or_else(|| Error::Config("cannot determine config directory".to_string()))?;
        Self::with_config_dir(config_dir)
    }

    /// Create settings rooted at a specific config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created or the
    /// device id file cannot be read or written.
    pub fn with_config_dir(config_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&config_dir).map_err(|e| {
            Error::Config(format!(
                "failed to create config directory {}: {e}",
                config_dir.display()
            ))
        })?;

        let device_id = load_or_create_device_id(&config_dir)?;

        let save_dir = default_save_dir();
        fs::create_dir_all(&save_dir).map_err(|e| {
            Error::Config(format!(
                "failed to create save directory {}: {e}",
                save_dir.display()
            ))
        })?;

        let device_name = hostname::get().map_or_else(
            |_| "Transfer Booth".to_string(),
            |h| h.to_string_lossy().to_string(),
        );

        Ok(Self {
            device_name: RwLock::new(device_name),
            save_dir: RwLock::new(save_dir),
            api_port: crate::DEFAULT_API_PORT,
            config_dir,
            device_id,
        })
    }

    /// Current device display name.
    #[must_use]
    pub fn device_name(&self) -> String {
        self.device_name
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Change the device display name.
    pub fn set_device_name(&self, name: &str) {
        *self
            .device_name
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = name.to_string();
    }

    /// Current save directory for received files.
    #[must_use]
    pub fn save_dir(&self) -> PathBuf {
        self.save_dir
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Change the save directory, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn set_save_dir(&self, path: PathBuf) -> Result<()> {
        fs::create_dir_all(&path).map_err(|e| {
            Error::Config(format!(
                "failed to create save directory {}: {e}",
                path.display()
            ))
        })?;
        *self
            .save_dir
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = path;
        Ok(())
    }

    /// Port of the external API adapter.
    #[must_use]
    pub fn api_port(&self) -> u16 {
        self.api_port
    }

    /// Stable device identifier.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Config directory for persistent state.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the long-term identity key.
    #[must_use]
    pub fn identity_key_path(&self) -> PathBuf {
        self.config_dir.join("identity.key")
    }

    /// Path of the trust store.
    #[must_use]
    pub fn trust_store_path(&self) -> PathBuf {
        self.config_dir.join("trusted_peers.json")
    }
}

/// Get the default config directory for this platform.
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "transferbooth", "TransferBooth")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default save directory (`<Downloads>/TransferBooth`).
///
/// Falls back to the home directory, then the current directory, when the
/// platform download location cannot be determined.
#[must_use]
pub fn default_save_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| {
            dirs.download_dir()
                .map(Path::to_path_buf)
                .or_else(|| Some(dirs.home_dir().to_path_buf()))
        })
        .unwrap_or_else(|| PathBuf::from("."))
        .join("TransferBooth")
}

/// Wire value for the local platform: `"windows"`, `"darwin"` or `"linux"`.
#[must_use]
pub fn platform_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Load the stable device id, minting and persisting one on first run.
fn load_or_create_device_id(config_dir: &Path) -> Result<String> {
    let path = config_dir.join("device_id");

    if path.exists() {
        let id = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read device id: {e}")))?;
        let id = id.trim().to_string();
        if !id.is_empty() {
            return Ok(id);
        }
    }

    let id = Uuid::new_v4().to_string();
    fs::write(&path, &id).map_err(|e| Error::Config(format!("failed to write device id: {e}")))?;
    Ok(id)
}
