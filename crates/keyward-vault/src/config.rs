//! Backend configuration.
//!
//! Loaded from TOML, then overridden from the environment:
//!
//! ```toml
//! [storage]
//! path = "data/keyward.db"    # omit for in-memory storage
//!
//! [salt]
//! secret = "<base64url>"      # omit to load/create the secret in storage
//!
//! [events]
//! capacity = 256              # 1..=65536
//!
//! [log]
//! level = "info"
//! ```
//!
//! | variable       | overrides        |
//! |----------------|------------------|
//! | `KEYWARD_DB`   | `storage.path`   |
//! | `KEYWARD_SALT` | `salt.secret`    |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::events::{DEFAULT_EVENT_CAPACITY, MAX_EVENT_CAPACITY};

/// Environment variable overriding [`StorageConfig::path`].
pub const ENV_DB: &str = "KEYWARD_DB";
/// Environment variable overriding [`SaltConfig::secret`].
pub const ENV_SALT: &str = "KEYWARD_SALT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    pub storage: StorageConfig,
    pub salt: SaltConfig,
    pub events: EventsConfig,
    pub log: LogConfig,
}

/// Where records are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite database file. `None` selects in-memory storage.
    pub path: Option<PathBuf>,
}

/// Salt secret source.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaltConfig {
    /// Base64url-encoded secret. `None` loads or creates one in storage.
    pub secret: Option<String>,
}

impl std::fmt::Debug for SaltConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaltConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Event bus settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Logging settings, consumed by the binary's tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl VaultConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| VaultError::Config {
            reason: format!("failed to parse TOML config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that the TOML schema cannot express.
    pub fn validate(&self) -> Result<()> {
        let capacity = self.events.capacity;
        if !(1..=MAX_EVENT_CAPACITY).contains(&capacity) {
            return Err(VaultError::Config {
                reason: format!(
                    "events.capacity must be between 1 and {MAX_EVENT_CAPACITY}, got {capacity}"
                ),
            });
        }
        Ok(())
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| VaultError::Config {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply `KEYWARD_DB` / `KEYWARD_SALT` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_DB) {
            self.storage.path = Some(PathBuf::from(path));
        }
        if let Some(secret) = get(ENV_SALT) {
            self.salt.secret = Some(secret);
        }
    }
}
