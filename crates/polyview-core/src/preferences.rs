//! User preferences persisted alongside sessions.
//!
//! Default service selections per mode, the active layout topology and the
//! crosscheck prompt template.

use crate::error::Result;
use crate::layout::Topology;
use crate::service::ServiceKey;
use crate::session::SessionMode;
use crate::store::{KeyValueStore, keys};
use std::sync::Arc;
use tracing::warn;

/// Placeholder replaced with the other services' responses.
pub const OTHER_RESPONSES_PLACEHOLDER: &str = "{{OTHER_RESPONSES}}";

pub const DEFAULT_CROSSCHECK_TEMPLATE: &str = "\
Here are answers from other assistants to the same question:

{{OTHER_RESPONSES}}

Review them critically. Point out mistakes or gaps, and say where you agree.";

#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Services selected by default for new interactive sessions.
    pub fn configured_services(&self) -> Vec<ServiceKey> {
        self.read_services(keys::CONFIGURED_SERVICES)
    }

    /// Services selected by default for new direct-call sessions.
    pub fn configured_api_services(&self) -> Vec<ServiceKey> {
        self.read_services(keys::CONFIGURED_API_SERVICES)
    }

    /// Default services for a new session of `mode`.
    ///
    /// An unset mode uses the interactive list since that is what the
    /// mode prompt offers first.
    pub fn default_services_for(&self, mode: SessionMode) -> Vec<ServiceKey> {
        match mode {
            SessionMode::DirectCall => self.configured_api_services(),
            SessionMode::Interactive | SessionMode::Unset => self.configured_services(),
        }
    }

    pub fn set_configured_services(&self, services: &[ServiceKey]) -> Result<()> {
        self.write_json(keys::CONFIGURED_SERVICES, &services)
    }

    pub fn set_configured_api_services(&self, services: &[ServiceKey]) -> Result<()> {
        self.write_json(keys::CONFIGURED_API_SERVICES, &services)
    }

    /// Stored topology, `Topology::LinearHorizontal` when missing or unknown.
    pub fn layout_mode(&self) -> Topology {
        match self.store.get(keys::LAYOUT_MODE) {
            Some(raw) => match serde_json::from_str::<Topology>(&raw) {
                Ok(topology) => topology,
                Err(err) => {
                    warn!(value = %raw, error = %err, "Unknown layout mode, using horizontal");
                    Topology::default()
                }
            },
            None => Topology::default(),
        }
    }

    pub fn set_layout_mode(&self, topology: Topology) -> Result<()> {
        self.write_json(keys::LAYOUT_MODE, &topology)
    }

    /// Stored crosscheck template, falling back to the built-in one when
    /// missing or when it lost its placeholder.
    pub fn crosscheck_template(&self) -> String {
        match self.store.get(keys::CROSSCHECK_TEMPLATE) {
            Some(raw) => match serde_json::from_str::<String>(&raw) {
                Ok(template) if template.contains(OTHER_RESPONSES_PLACEHOLDER) => template,
                _ => {
                    warn!("Stored crosscheck template is invalid, using default");
                    DEFAULT_CROSSCHECK_TEMPLATE.to_string()
                }
            },
            None => DEFAULT_CROSSCHECK_TEMPLATE.to_string(),
        }
    }

    pub fn set_crosscheck_template(&self, template: &str) -> Result<()> {
        self.write_json(keys::CROSSCHECK_TEMPLATE, &template)
    }

    fn read_services(&self, key: &str) -> Vec<ServiceKey> {
        let Some(raw) = self.store.get(key) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(key, error = %err, "Ignoring unreadable service list");
            Vec::new()
        })
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, String>>);

    impl KeyValueStore for MapStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
            self.0.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) {
            self.0.lock().unwrap().remove(key);
        }
    }

    #[test]
    fn test_default_services_follow_mode() {
        let prefs = Preferences::new(Arc::new(MapStore::default()));
        prefs.set_configured_services(&["web".into()]).unwrap();
        prefs.set_configured_api_services(&["api".into()]).unwrap();
        assert_eq!(
            prefs.default_services_for(SessionMode::Interactive),
            vec![ServiceKey::new("web")]
        );
        assert_eq!(
            prefs.default_services_for(SessionMode::DirectCall),
            vec![ServiceKey::new("api")]
        );
    }

    #[test]
    fn test_layout_mode_round_trip_and_fallback() {
        let store = Arc::new(MapStore::default());
        let prefs = Preferences::new(store.clone());
        assert_eq!(prefs.layout_mode(), Topology::LinearHorizontal);
        prefs.set_layout_mode(Topology::Grid).unwrap();
        assert_eq!(store.get(keys::LAYOUT_MODE).as_deref(), Some("\"grid\""));
        assert_eq!(prefs.layout_mode(), Topology::Grid);

        store.set(keys::LAYOUT_MODE, "\"diagonal\"").unwrap();
        assert_eq!(prefs.layout_mode(), Topology::LinearHorizontal);
    }

    #[test]
    fn test_crosscheck_template_requires_placeholder() {
        let prefs = Preferences::new(Arc::new(MapStore::default()));
        assert!(prefs.crosscheck_template().contains(OTHER_RESPONSES_PLACEHOLDER));

        prefs.set_crosscheck_template("Compare: {{OTHER_RESPONSES}}").unwrap();
        assert_eq!(prefs.crosscheck_template(), "Compare: {{OTHER_RESPONSES}}");

        prefs.set_crosscheck_template("no placeholder").unwrap();
        assert_eq!(prefs.crosscheck_template(), DEFAULT_CROSSCHECK_TEMPLATE);
    }
}
