//! Sliding-window chat history.
//!
//! Each (session, service) pair keeps at most `limit` messages; appending past
//! the limit drops the oldest entries. Every append is written through to the
//! session store so a crash loses at most the in-flight message.

use super::message::{ChatMessage, MessageRole};
use super::model::SessionId;
use super::store::{SessionStore, UrlSource};
use crate::config::{AppConfig, DEFAULT_HISTORY_LIMIT};
use crate::error::{PolyviewError, Result};
use crate::service::ServiceKey;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct ChatHistoryManager {
    limit: usize,
}

impl Default for ChatHistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ChatHistoryManager {
    pub fn new(limit: usize) -> Self {
        Self { limit: limit.max(1) }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.history_limit)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Appends a message to the history of `service` in `session_id` and saves.
    ///
    /// `System` messages are transient and are not stored; the call returns
    /// `Ok(false)` for them. Appending to a session that no longer exists is
    /// an error: the caller decides whether to drop the message.
    pub fn append(
        &self,
        store: &mut SessionStore,
        urls: &dyn UrlSource,
        session_id: &SessionId,
        service: &ServiceKey,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Result<bool> {
        if !role.is_persistent() {
            return Ok(false);
        }

        let session = store
            .session_mut(session_id)
            .ok_or_else(|| PolyviewError::not_found("session", session_id.as_str()))?;
        let history = session.chat_history.entry(service.clone()).or_default();
        push_bounded(history, ChatMessage::new(role, content), self.limit);
        debug!(
            session_id = %session_id,
            service = %service,
            len = history.len(),
            "Appended chat message"
        );

        if let Err(err) = store.save(urls) {
            warn!(error = %err, "Chat history saved in memory only");
            return Err(err);
        }
        Ok(true)
    }

    /// The replayable history of `service` in `session_id`, oldest first.
    pub fn read(
        &self,
        store: &SessionStore,
        session_id: &SessionId,
        service: &ServiceKey,
    ) -> Vec<ChatMessage> {
        store
            .session(session_id)
            .and_then(|s| s.chat_history.get(service))
            .map(|history| {
                history
                    .iter()
                    .filter(|m| m.role.is_persistent())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Pushes `message` and drops the oldest entries beyond `limit`.
pub(crate) fn push_bounded(history: &mut Vec<ChatMessage>, message: ChatMessage, limit: usize) {
    history.push(message);
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}
