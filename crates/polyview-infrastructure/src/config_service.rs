//! Configuration service implementation.
//!
//! Loads [`AppConfig`] from `config.toml` (`~/.config/polyview/config.toml`
//! by default). A missing file yields the defaults; a malformed one is an
//! error so a typo is not silently ignored.

use crate::paths::PolyviewPaths;
use polyview_core::config::AppConfig;
use polyview_core::error::{PolyviewError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Loads and caches the application configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl ConfigService {
    /// A service reading the platform config file.
    pub fn new(paths: &PolyviewPaths) -> Result<Self> {
        let path = paths
            .config_file()
            .map_err(|e| PolyviewError::config(e.to_string()))?;
        Ok(Self::with_path(path))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configuration, loading it on first access.
    pub fn get_config(&self) -> Result<AppConfig> {
        if let Some(cached) = self.read_cache() {
            return Ok(cached);
        }
        let loaded = Self::load_from(&self.path)?;
        if let Ok(mut cache) = self.config.write() {
            *cache = Some(loaded.clone());
        }
        Ok(loaded)
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) {
        if let Ok(mut cache) = self.config.write() {
            *cache = None;
        }
    }

    /// Writes `config` to the config file and refreshes the cache.
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(config)?)?;
        if let Ok(mut cache) = self.config.write() {
            *cache = Some(config.clone());
        }
        info!(path = %self.path.display(), "Saved configuration");
        Ok(())
    }

    fn read_cache(&self) -> Option<AppConfig> {
        self.config.read().ok().and_then(|cache| cache.clone())
    }

    fn load_from(path: &Path) -> Result<AppConfig> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let config: AppConfig = toml::from_str(&content)?;
                debug!(path = %path.display(), "Loaded configuration");
                Ok(config)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(AppConfig::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}
