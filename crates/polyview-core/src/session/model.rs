//! Session domain model.
//!
//! A session is a user-named workspace grouping an ordered set of active
//! services, a content mode, and per-service state (navigation URLs for
//! interactive panels, chat transcripts for direct-call panels).

use super::message::ChatMessage;
use super::mode::SessionMode;
use crate::service::ServiceKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque, stable session identifier (UUID format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Represents a user session.
///
/// `selected_services` is an ordered set: insertion order is display order and
/// duplicates are rejected by the mutators below. Mutate it through those
/// methods rather than directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier, immutable
    pub id: SessionId,
    /// User-assigned label
    pub name: Option<String>,
    /// Smallest free positive integer at creation time, stable afterwards
    pub session_number: u32,
    /// Active services in display order
    #[serde(default)]
    pub selected_services: Vec<ServiceKey>,
    #[serde(default)]
    pub mode: SessionMode,
    /// Last known navigation URL per service (interactive mode)
    #[serde(default)]
    pub service_urls: BTreeMap<ServiceKey, String>,
    /// Transcript per service (direct-call mode)
    #[serde(default)]
    pub chat_history: BTreeMap<ServiceKey, Vec<ChatMessage>>,
    /// Unsent input text
    #[serde(default)]
    pub prompt_draft: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

impl Session {
    /// Label shown on the session tab.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("Session {}", self.session_number),
        }
    }

    pub fn is_selected(&self, service: &ServiceKey) -> bool {
        self.selected_services.contains(service)
    }

    /// Appends `service` to the selection. Returns `false` if already selected.
    pub fn select_service(&mut self, service: ServiceKey) -> bool {
        if self.is_selected(&service) {
            return false;
        }
        self.selected_services.push(service);
        true
    }

    /// Removes `service` from the selection. Returns `false` if it was not selected.
    pub fn deselect_service(&mut self, service: &ServiceKey) -> bool {
        let before = self.selected_services.len();
        self.selected_services.retain(|s| s != service);
        before != self.selected_services.len()
    }

    /// Toggles `service`, returning whether it is selected afterwards.
    pub fn toggle_service(&mut self, service: ServiceKey) -> bool {
        if self.deselect_service(&service) {
            false
        } else {
            self.select_service(service)
        }
    }

    /// Re-splices the selection: removes `service` and inserts it at
    /// `target_index` (clamped to the end). Returns `false` if `service` is
    /// not selected or the order did not change.
    pub fn move_service(&mut self, service: &ServiceKey, target_index: usize) -> bool {
        let Some(from) = self.selected_services.iter().position(|s| s == service) else {
            return false;
        };
        let key = self.selected_services.remove(from);
        let to = target_index.min(self.selected_services.len());
        self.selected_services.insert(to, key);
        from != to
    }

    /// Total number of persisted messages across all services.
    pub fn history_len(&self) -> usize {
        self.chat_history.values().map(Vec::len).sum()
    }
}
