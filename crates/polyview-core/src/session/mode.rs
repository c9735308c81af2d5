//! Session content mode.

use serde::{Deserialize, Serialize};

/// How a session renders its services.
///
/// `Unset` means the user has not chosen yet and will be prompted on the
/// first content render. Once set, the mode persists for the session's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    #[default]
    Unset,
    /// Embedded live surface per service.
    Interactive,
    /// Request/response exchange with a persisted transcript.
    DirectCall,
}

impl SessionMode {
    pub fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }
}
