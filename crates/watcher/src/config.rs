//! Watch configuration
//!
//! Loaded from TOML:
//! ```toml
//! path = "./site"
//! backend = "native"     # or "reload"
//! debounce_ms = 1000
//! reload_command = "air"
//! ```

use crate::backend::{Backend, DEFAULT_RELOAD_COMMAND};
use crate::error::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Watch session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory to watch
    #[serde(default)]
    pub path: PathBuf,

    /// Backend selector (default: "native")
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Debounce window in milliseconds (default: 1000)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Command run by the reload backend (default: "air")
    #[serde(default = "default_reload_command")]
    pub reload_command: String,
}

impl WatchConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| WatchError::config(format!("bad config: {e}")))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WatchError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Check values that would otherwise only fail at start
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(WatchError::config("watch path is empty"));
        }
        if self.debounce_ms == 0 {
            return Err(WatchError::config("debounce_ms must be at least 1"));
        }
        if self.reload_command.trim().is_empty() {
            return Err(WatchError::config("reload_command is empty"));
        }
        self.backend.parse::<Backend>()?;
        Ok(())
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            backend: default_backend(),
            debounce_ms: default_debounce_ms(),
            reload_command: default_reload_command(),
        }
    }
}

fn default_backend() -> String {
    "native".to_string()
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_reload_command() -> String {
    DEFAULT_RELOAD_COMMAND.to_string()
}
