//! Service registry.
//!
//! A service is one external AI provider, identified by a stable key. The
//! registry is supplied by the host application and is read-only here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier of an AI service (e.g. `"chatgpt"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Static description of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub display_name: String,
    pub default_url: String,
}

impl ServiceConfig {
    pub fn new(display_name: impl Into<String>, default_url: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            default_url: default_url.into(),
        }
    }
}

/// Lookup table from [`ServiceKey`] to [`ServiceConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<ServiceKey, ServiceConfig>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with(mut self, key: impl Into<ServiceKey>, config: ServiceConfig) -> Self {
        self.register(key, config);
        self
    }

    pub fn register(&mut self, key: impl Into<ServiceKey>, config: ServiceConfig) {
        self.services.insert(key.into(), config);
    }

    pub fn get(&self, key: &ServiceKey) -> Option<&ServiceConfig> {
        self.services.get(key)
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.services.contains_key(key)
    }

    /// Display name for `key`, falling back to the raw key.
    pub fn display_name(&self, key: &ServiceKey) -> String {
        self.get(key)
            .map(|c| c.display_name.clone())
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_key() {
        let registry = ServiceRegistry::new().with(
            "claude",
            ServiceConfig::new("Claude", "https://claude.ai"),
        );
        assert_eq!(registry.display_name(&"claude".into()), "Claude");
        assert_eq!(registry.display_name(&"unknown".into()), "unknown");
    }

    #[test]
    fn test_service_key_serializes_as_plain_string() {
        let json = serde_json::to_string(&ServiceKey::new("gemini")).unwrap();
        assert_eq!(json, "\"gemini\"");
    }
}
