//! Database configuration
//!
//! A [`Configuration`] describes one database file and, optionally, how it is
//! synchronized with a server. Path resolution happens before a configuration
//! reaches this crate: paths are taken as given.
//!
//! Configurations can be built in code or loaded from TOML:
//!
//! ```
//! use vellum_core::config::{ClientResyncMode, Configuration};
//!
//! let config = Configuration::from_toml_str(r#"
//!     path = "/tmp/tasks.realm"
//!     schema_version = 3
//!
//!     [sync]
//!     server_url = "wss://sync.example.com"
//!     partition = "team-a"
//!     resync_mode = "discard_local"
//!
//!     [sync.user]
//!     id = "7f1c2a4e-3d3b-4f5e-9a1b-0c2d3e4f5a6b"
//!     identity = "alice"
//! "#).unwrap();
//!
//! assert_eq!(config.schema_version, 3);
//! assert_eq!(config.sync.unwrap().resync_mode, ClientResyncMode::DiscardLocal);
//! ```

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Required encryption key length in bytes
pub const ENCRYPTION_KEY_LEN: usize = 64;

/// URL schemes accepted for sync servers
const SYNC_SCHEMES: [&str; 4] = ["ws://", "wss://", "realm://", "realms://"];

/// 64-byte database encryption key
///
/// Serialized as base64. The key bytes never appear in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncryptionKey(Box<[u8; ENCRYPTION_KEY_LEN]>);

impl EncryptionKey {
    /// Create a key from raw bytes
    ///
    /// Fails with `InvalidConfiguration` unless exactly 64 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key: [u8; ENCRYPTION_KEY_LEN] = bytes.try_into().map_err(|_| {
            Error::InvalidConfiguration(format!(
                "encryption key must be {} bytes long, got {}",
                ENCRYPTION_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(Box::new(key)))
    }

    /// Decode a base64 key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::InvalidConfiguration(format!("encryption key: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; ENCRYPTION_KEY_LEN] {
        &self.0
    }
}

impl TryFrom<String> for EncryptionKey {
    type Error = Error;

    fn try_from(encoded: String) -> Result<Self> {
        Self::from_base64(&encoded)
    }
}

impl From<EncryptionKey> for String {
    fn from(key: EncryptionKey) -> Self {
        STANDARD.encode(key.as_bytes())
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Strategy when local state has diverged from the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientResyncMode {
    /// Keep local changes and replay them on top of the server state
    #[default]
    RecoverLocal,
    /// Throw away local changes and take the server state
    DiscardLocal,
    /// Surface the divergence to the application
    Manual,
}

/// Authenticated user a sync session runs as
///
/// Only the identity reference crosses into native; credentials are handled
/// by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncUser {
    /// Stable user id
    pub id: Uuid,
    /// Server-side identity
    pub identity: String,
}

impl SyncUser {
    /// Create a user reference
    pub fn new(id: Uuid, identity: impl Into<String>) -> Self {
        Self {
            id,
            identity: identity.into(),
        }
    }
}

/// Sync section of a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfiguration {
    /// Server endpoint
    pub server_url: String,
    /// User the session authenticates as
    pub user: SyncUser,
    /// Partition value selecting the server-side data set
    #[serde(default)]
    pub partition: String,
    /// Divergence policy
    #[serde(default)]
    pub resync_mode: ClientResyncMode,
}

impl SyncConfiguration {
    /// Create a sync section with the default resync policy
    pub fn new(server_url: impl Into<String>, user: SyncUser, partition: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            user,
            partition: partition.into(),
            resync_mode: ClientResyncMode::default(),
        }
    }

    /// Set the resync policy
    pub fn with_resync_mode(mut self, mode: ClientResyncMode) -> Self {
        self.resync_mode = mode;
        self
    }
}

/// Configuration of one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Database file path
    pub path: PathBuf,
    /// Optional encryption key
    #[serde(default)]
    pub encryption_key: Option<EncryptionKey>,
    /// Version of the caller's schema
    #[serde(default)]
    pub schema_version: u64,
    /// Open without a caller schema and introspect it from the file
    #[serde(default)]
    pub is_dynamic: bool,
    /// Open read-only
    #[serde(default)]
    pub read_only: bool,
    /// Sync section; `None` for a local-only database
    #[serde(default)]
    pub sync: Option<SyncConfiguration>,
}

impl Configuration {
    /// Local configuration for a path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            encryption_key: None,
            schema_version: 0,
            is_dynamic: false,
            read_only: false,
            sync: None,
        }
    }

    /// Parse and validate a TOML configuration
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Configuration = toml::from_str(source)
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be handed to the native engine
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfiguration("path must not be empty".into()));
        }
        if let Some(sync) = &self.sync {
            if !SYNC_SCHEMES.iter().any(|s| sync.server_url.starts_with(s)) {
                return Err(Error::InvalidConfiguration(format!(
                    "unsupported sync server url: {}",
                    sync.server_url
                )));
            }
            if self.read_only {
                return Err(Error::InvalidConfiguration(
                    "synchronized databases cannot be opened read-only".into(),
                ));
            }
        }
        Ok(())
    }

    /// Check if this database synchronizes with a server
    pub fn is_synchronized(&self) -> bool {
        self.sync.is_some()
    }
}
