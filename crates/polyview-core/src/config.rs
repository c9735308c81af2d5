//! Application configuration model.
//!
//! Loaded from `config.toml` by `polyview-infrastructure::ConfigService`.
//! Every field has a default so a partial or missing file is valid.

use crate::session::SessionMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mode applied to sessions created without an explicit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultMode {
    /// Leave the mode unset so the user is prompted on first render.
    #[default]
    Ask,
    Interactive,
    DirectCall,
}

impl DefaultMode {
    /// The session mode a new session starts with.
    pub fn initial_mode(self) -> SessionMode {
        match self {
            Self::Ask => SessionMode::Unset,
            Self::Interactive => SessionMode::Interactive,
            Self::DirectCall => SessionMode::DirectCall,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Maximum messages kept per (session, service) history.
    pub history_limit: usize,
    /// Messages kept per history when recovering from a quota error.
    pub retention_floor: usize,
    /// Minimum panel extent in pixels during resize.
    pub min_panel_extent: f64,
    /// Upper bound on waiting for an interactive panel to load.
    pub load_timeout_secs: u64,
    pub default_mode: DefaultMode,
    /// Quota for the file-backed store.
    pub storage_quota_bytes: usize,
}

pub const DEFAULT_HISTORY_LIMIT: usize = 12;
pub const DEFAULT_RETENTION_FLOOR: usize = 6;
pub const DEFAULT_MIN_PANEL_EXTENT: f64 = 150.0;
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_STORAGE_QUOTA_BYTES: usize = 5 * 1024 * 1024;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            retention_floor: DEFAULT_RETENTION_FLOOR,
            min_panel_extent: DEFAULT_MIN_PANEL_EXTENT,
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            default_mode: DefaultMode::Ask,
            storage_quota_bytes: DEFAULT_STORAGE_QUOTA_BYTES,
        }
    }
}

impl AppConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig =
            toml::from_str("history_limit = 20\ndefault_mode = \"direct-call\"\n").unwrap();
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.default_mode, DefaultMode::DirectCall);
        assert_eq!(config.retention_floor, DEFAULT_RETENTION_FLOOR);
        assert_eq!(config.load_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_ask_leaves_mode_unset() {
        assert_eq!(DefaultMode::Ask.initial_mode(), SessionMode::Unset);
        assert_eq!(DefaultMode::Interactive.initial_mode(), SessionMode::Interactive);
    }
}
