//! Key/value persistence seam.
//!
//! Every persisted piece of Polyview state (sessions, preferences, layout
//! records) goes through a [`KeyValueStore`]. Values are strings, almost always
//! JSON-encoded. Implementations live in `polyview-infrastructure`.

use thiserror::Error;

/// Storage keys shared by every component that persists state.
pub mod keys {
    pub const SESSIONS: &str = "sessions";
    pub const CURRENT_SESSION_ID: &str = "current-session-id";
    pub const SESSION_COUNTER: &str = "session-counter";
    pub const CONFIGURED_SERVICES: &str = "configured-services";
    pub const CONFIGURED_API_SERVICES: &str = "configured-api-services";
    pub const LAYOUT_MODE: &str = "layout-mode";
    pub const CROSSCHECK_TEMPLATE: &str = "crosscheck-template";
    /// Prefix for per-topology layout records (`wrapper-sizes-{topology}`).
    pub const WRAPPER_SIZES_PREFIX: &str = "wrapper-sizes-";
}

/// Errors reported by a [`KeyValueStore`] write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Writing `key` would grow the store past its quota.
    #[error("quota exceeded writing '{key}' ({needed} bytes needed, quota {quota})")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    /// The backing medium failed.
    #[error("store I/O failure: {0}")]
    Io(String),
}

impl StoreError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// A string key/value store with a size quota.
///
/// Methods take `&self`; implementations use interior mutability so a single
/// store can be shared (`Arc<dyn KeyValueStore>`) by the session store, the
/// layout engine and the preferences.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str);
}
