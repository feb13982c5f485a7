//! Process settings, read once at startup.
//!
//! These are distinct from the runtime [`ServerConfig`](crate::core::ServerConfig):
//! settings say where state lives and how long external calls may take, and
//! never change while the process runs.

mod loader;

pub use loader::SettingsLoader;

use crate::core::{Validate, normalize_user};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default budget for fetching one product page.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default budget for delivering one message to one channel.
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;

const CONFIG_FILE: &str = "config.json";
const MANIFEST_FILE: &str = "last_manifest.json";

/// Settings for a stockwatch process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the configuration and manifest snapshots.
    pub data_dir: PathBuf,
    /// The designated root operator. It is always whitelisted.
    pub root_user: String,
    /// Seconds allowed for fetching one product page.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Seconds allowed for delivering one message to one channel.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

impl Settings {
    /// Settings with default timeouts.
    pub fn new(data_dir: impl Into<PathBuf>, root_user: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            root_user: root_user.into(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
        }
    }

    /// Create a loader merging defaults, files and environment variables.
    pub fn loader() -> SettingsLoader {
        SettingsLoader::new()
    }

    /// Path of the runtime configuration snapshot.
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    /// Path of the last differing manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join(MANIFEST_FILE)
    }

    /// Budget for fetching one product page.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Budget for delivering one message to one channel.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if normalize_user(&self.root_user).is_none() {
            errors.push(ValidationError::invalid_field("root_user", "must not be empty"));
        }
        if self.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::invalid_field("data_dir", "must not be empty"));
        }
        if self.fetch_timeout_secs == 0 {
            errors.push(ValidationError::invalid_field(
                "fetch_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.send_timeout_secs == 0 {
            errors.push(ValidationError::invalid_field(
                "send_timeout_secs",
                "must be greater than 0",
            ));
        }

        ValidationError::collect(errors)
    }
}

/// The per-user cache directory for stockwatch state.
///
/// `<platform cache dir>/stockwatch` (`$XDG_CACHE_HOME` or `~/.cache` on
/// Linux, `~/Library/Caches` on macOS, `%LOCALAPPDATA%` on Windows), or
/// `./stockwatch` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stockwatch")
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_send_timeout() -> u64 {
    DEFAULT_SEND_TIMEOUT_SECS
}
