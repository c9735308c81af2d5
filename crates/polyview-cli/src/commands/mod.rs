pub mod config;
pub mod layout;
pub mod sessions;

use anyhow::{Context as _, Result};
use polyview_core::config::AppConfig;
use polyview_core::preferences::Preferences;
use polyview_core::session::{LoadOptions, LoadReport, SessionStore};
use polyview_core::store::KeyValueStore;
use polyview_infrastructure::{ConfigService, JsonFileStore, PolyviewPaths};
use std::path::PathBuf;
use std::sync::Arc;

/// Resolved paths and configuration shared by every command.
pub struct Context {
    pub paths: PolyviewPaths,
    pub config_service: ConfigService,
    pub config: AppConfig,
}

impl Context {
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let paths = PolyviewPaths::new(base_dir);
        let config_service = ConfigService::new(&paths).context("Failed to locate config file")?;
        let config = config_service
            .get_config()
            .with_context(|| format!("Failed to load {}", config_service.path().display()))?;
        Ok(Self {
            paths,
            config_service,
            config,
        })
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.paths.store_file()?)
    }

    pub fn open_store(&self) -> Result<Arc<JsonFileStore>> {
        let path = self.store_path()?;
        let store = JsonFileStore::open(&path, self.config.storage_quota_bytes)
            .with_context(|| format!("Failed to open store {}", path.display()))?;
        Ok(Arc::new(store))
    }

    /// Loads sessions the way the application does at startup.
    pub fn load_sessions(&self, store: Arc<dyn KeyValueStore>) -> (SessionStore, LoadReport) {
        let preferences = Preferences::new(Arc::clone(&store));
        let default_mode = self.config.default_mode.initial_mode();
        let mut sessions = SessionStore::new(store, &self.config);
        let report = sessions.load(LoadOptions {
            default_services: preferences.default_services_for(default_mode),
            default_mode,
        });
        (sessions, report)
    }
}
