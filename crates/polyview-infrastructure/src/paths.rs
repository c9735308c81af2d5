//! Path management for Polyview files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/polyview/          # Config directory
//! ├── config.toml              # Application configuration
//! └── logs/                    # Application logs
//!     └── polyview.log.YYYY-MM-DD
//!
//! ~/.local/share/polyview/     # Data directory
//! └── store.json               # Key/value store (sessions, layouts, preferences)
//! ```
//!
//! A base directory override places both trees under one root, which is what
//! tests and portable installs use.

use std::fmt;
use std::path::PathBuf;

const APP_DIR: &str = "polyview";

/// Errors that can occur during path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The platform config or data directory could not be determined.
    HomeDirNotFound,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

#[derive(Debug, Clone, Default)]
pub struct PolyviewPaths {
    base: Option<PathBuf>,
}

impl PolyviewPaths {
    /// `base` replaces the platform directories when given.
    pub fn new(base: Option<PathBuf>) -> Self {
        Self { base }
    }

    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.join("config")),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.join("data")),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    pub fn store_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("store.json"))
    }

    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_override() {
        let paths = PolyviewPaths::new(Some(PathBuf::from("/opt/pv")));
        assert_eq!(paths.config_file().unwrap(), PathBuf::from("/opt/pv/config/config.toml"));
        assert_eq!(paths.store_file().unwrap(), PathBuf::from("/opt/pv/data/store.json"));
        assert_eq!(paths.logs_dir().unwrap(), PathBuf::from("/opt/pv/config/logs"));
    }
}
