//! Session list, current-session pointer, and their persistence.

use super::message::ChatMessage;
use super::mode::SessionMode;
use super::model::{Session, SessionId};
use crate::config::{AppConfig, DefaultMode};
use crate::error::{PolyviewError, Result};
use crate::service::ServiceKey;
use crate::store::{KeyValueStore, keys};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Provides live navigation URLs for the panels of a session.
///
/// Implemented by the panel multiplexer. Each entry is captured independently;
/// a failed capture never prevents the others.
pub trait UrlSource {
    fn capture_urls(&self, session_id: &SessionId) -> Vec<(ServiceKey, Result<String>)>;
}

/// A [`UrlSource`] with no panels, for saves outside an interactive context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUrlSource;

impl UrlSource for NoUrlSource {
    fn capture_urls(&self, _session_id: &SessionId) -> Vec<(ServiceKey, Result<String>)> {
        Vec::new()
    }
}

/// Defaults used when `load` has to synthesize a session.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub default_services: Vec<ServiceKey>,
    pub default_mode: SessionMode,
}

/// A repair performed while loading persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// The stored session list could not be parsed and was discarded.
    DiscardedUnreadableSessions,
    /// The list was empty, so a default session was created.
    SynthesizedDefaultSession { id: SessionId },
    /// A session had no (or a duplicate) session number.
    AssignedSessionNumber { id: SessionId, number: u32 },
    /// The current-session pointer was missing or dangling.
    ResetCurrentSession {
        from: Option<String>,
        to: SessionId,
    },
    /// The stored counter was missing, unreadable or behind the session count.
    ResetSessionCounter { value: u64 },
}

/// Outcome of [`SessionStore::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub repairs: Vec<Repair>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.repairs.is_empty()
    }
}

/// On-disk session shape, lenient about fields older builds did not write.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    id: SessionId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    session_number: Option<u32>,
    #[serde(default)]
    selected_services: Vec<ServiceKey>,
    #[serde(default)]
    mode: SessionMode,
    #[serde(default)]
    service_urls: BTreeMap<ServiceKey, String>,
    #[serde(default)]
    chat_history: BTreeMap<ServiceKey, Vec<ChatMessage>>,
    #[serde(default)]
    prompt_draft: String,
    #[serde(default)]
    created_at: Option<String>,
}

/// Owns the session list and the current-session pointer.
///
/// `SessionStore` is responsible for:
/// - Creating sessions with gap-filled session numbers
/// - Tracking (and healing) the current session
/// - Persisting everything to a [`KeyValueStore`], with quota recovery
/// - Restoring and repairing persisted state on startup
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    sessions: Vec<Session>,
    current_session_id: Option<SessionId>,
    session_counter: u64,
    default_mode: DefaultMode,
    retention_floor: usize,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &AppConfig) -> Self {
        Self {
            store,
            sessions: Vec::new(),
            current_session_id: None,
            session_counter: 0,
            default_mode: config.default_mode,
            retention_floor: config.retention_floor,
        }
    }

    // ============================================================================
    // Construction and list mutation
    // ============================================================================

    /// Smallest positive integer not used by any live session.
    pub fn next_session_number(&self) -> u32 {
        let used: BTreeSet<u32> = self.sessions.iter().map(|s| s.session_number).collect();
        smallest_unused(&used)
    }

    /// Builds a new session without adding it to the store.
    ///
    /// An omitted `mode` falls back to the configured default mode, which is
    /// `Unset` when the user wants to be asked.
    pub fn create_session(
        &self,
        name: Option<String>,
        selected_services: Option<Vec<ServiceKey>>,
        mode: Option<SessionMode>,
    ) -> Session {
        let mut session = Session {
            id: SessionId::generate(),
            name,
            session_number: self.next_session_number(),
            selected_services: Vec::new(),
            mode: mode.unwrap_or_else(|| self.default_mode.initial_mode()),
            service_urls: BTreeMap::new(),
            chat_history: BTreeMap::new(),
            prompt_draft: String::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        for service in selected_services.unwrap_or_default() {
            session.select_service(service);
        }
        session
    }

    /// Adds `session` to the list. The first session added becomes current.
    pub fn add_session(&mut self, session: Session) {
        debug!(
            session_id = %session.id,
            session_number = session.session_number,
            "Adding session"
        );
        if self.current_session_id.is_none() {
            self.current_session_id = Some(session.id.clone());
        }
        self.session_counter += 1;
        self.sessions.push(session);
    }

    /// Removes the session with `id`. Returns `false` if it was not present.
    pub fn remove_session(&mut self, id: &SessionId) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| &s.id != id);
        let removed = before != self.sessions.len();
        if removed {
            debug!(session_id = %id, "Removed session");
        }
        removed
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }

    /// Looks up a session, reporting a typed error when it does not exist.
    pub fn require(&self, id: &SessionId) -> Result<&Session> {
        self.session(id)
            .ok_or_else(|| PolyviewError::not_found("session", id.as_str()))
    }

    pub fn session_counter(&self) -> u64 {
        self.session_counter
    }

    // ============================================================================
    // Current session
    // ============================================================================

    /// The session the pointer refers to, or the first session if the
    /// pointer is stale, or `None` when there are no sessions.
    pub fn current_session(&self) -> Option<&Session> {
        self.resolve_current_index().map(|i| &self.sessions[i])
    }

    pub fn current_session_mut(&mut self) -> Option<&mut Session> {
        self.resolve_current_index().map(|i| &mut self.sessions[i])
    }

    /// Resolved id of the current session.
    pub fn current_session_id(&self) -> Option<&SessionId> {
        self.current_session().map(|s| &s.id)
    }

    /// Points the current-session pointer at `id`. Returns `false` if no
    /// session has that id.
    pub fn set_current_session(&mut self, id: &SessionId) -> bool {
        if self.session(id).is_none() {
            return false;
        }
        self.current_session_id = Some(id.clone());
        true
    }

    fn resolve_current_index(&self) -> Option<usize> {
        if self.sessions.is_empty() {
            return None;
        }
        let index = self
            .current_session_id
            .as_ref()
            .and_then(|id| self.sessions.iter().position(|s| &s.id == id));
        Some(index.unwrap_or(0))
    }

    // ============================================================================
    // Persistence
    // ============================================================================

    /// Persists sessions, the current-session pointer and the counter.
    ///
    /// Before writing, navigation URLs of the current session's panels are
    /// captured from `urls` (interactive sessions only; failures are logged
    /// and skipped). On a quota error every history is trimmed to the
    /// retention floor and the write is retried once.
    pub fn save(&mut self, urls: &dyn UrlSource) -> Result<()> {
        self.capture_current_urls(urls);

        match self.write_all() {
            Err(err) if err.is_quota_exceeded() => {
                let trimmed = self.trim_histories(self.retention_floor);
                warn!(
                    error = %err,
                    trimmed_histories = trimmed,
                    retention_floor = self.retention_floor,
                    "Storage quota exceeded, retrying save with trimmed chat history"
                );
                self.write_all().inspect_err(|err| {
                    warn!(error = %err, "Save failed after quota recovery");
                })
            }
            other => other,
        }
    }

    /// Truncates every history longer than `floor` to its most recent `floor`
    /// entries, across all sessions. Returns how many histories were cut.
    pub fn trim_histories(&mut self, floor: usize) -> usize {
        let mut trimmed = 0;
        for session in &mut self.sessions {
            for history in session.chat_history.values_mut() {
                if history.len() > floor {
                    history.drain(..history.len() - floor);
                    trimmed += 1;
                }
            }
        }
        trimmed
    }

    fn capture_current_urls(&mut self, urls: &dyn UrlSource) {
        let Some(session) = self.current_session_mut() else {
            return;
        };
        if session.mode != SessionMode::Interactive {
            return;
        }
        for (service, captured) in urls.capture_urls(&session.id) {
            match captured {
                Ok(url) => {
                    session.service_urls.insert(service, url);
                }
                Err(err) => {
                    warn!(
                        session_id = %session.id,
                        service = %service,
                        error = %err,
                        "Failed to capture panel URL, keeping previous value"
                    );
                }
            }
        }
    }

    fn write_all(&self) -> Result<()> {
        let sessions = serde_json::to_string(&self.sessions)?;
        self.store.set(keys::SESSIONS, &sessions)?;
        match self.current_session_id() {
            Some(id) => self.store.set(keys::CURRENT_SESSION_ID, id.as_str())?,
            None => self.store.remove(keys::CURRENT_SESSION_ID),
        }
        self.store
            .set(keys::SESSION_COUNTER, &self.session_counter.to_string())?;
        Ok(())
    }

    /// Restores state from the store, repairing whatever is inconsistent.
    ///
    /// Never fails: unreadable data degrades to an empty list, and an empty
    /// list gets one default session built from `options`.
    pub fn load(&mut self, options: LoadOptions) -> LoadReport {
        let mut report = LoadReport::default();

        let stored = match self.store.get(keys::SESSIONS) {
            Some(raw) => match serde_json::from_str::<Vec<StoredSession>>(&raw) {
                Ok(stored) => stored,
                Err(err) => {
                    warn!(error = %err, "Stored sessions are unreadable, starting empty");
                    report.repairs.push(Repair::DiscardedUnreadableSessions);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        self.sessions = repair_session_numbers(stored, &mut report);

        if self.sessions.is_empty() {
            let session = self.create_session(
                None,
                Some(options.default_services),
                Some(options.default_mode),
            );
            info!(session_id = %session.id, "No sessions stored, created default session");
            report.repairs.push(Repair::SynthesizedDefaultSession {
                id: session.id.clone(),
            });
            self.sessions.push(session);
        }

        let stored_current = self.store.get(keys::CURRENT_SESSION_ID);
        let valid = stored_current
            .as_deref()
            .is_some_and(|id| self.sessions.iter().any(|s| s.id.as_str() == id));
        if valid {
            self.current_session_id = stored_current.map(SessionId::new);
        } else {
            let first = self.sessions[0].id.clone();
            info!(from = ?stored_current, to = %first, "Repaired current session pointer");
            report.repairs.push(Repair::ResetCurrentSession {
                from: stored_current,
                to: first.clone(),
            });
            self.current_session_id = Some(first);
        }

        let minimum = self.sessions.len() as u64;
        match self
            .store
            .get(keys::SESSION_COUNTER)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
        {
            Some(counter) if counter >= minimum => self.session_counter = counter,
            _ => {
                info!(value = minimum, "Repaired session counter");
                report
                    .repairs
                    .push(Repair::ResetSessionCounter { value: minimum });
                self.session_counter = minimum;
            }
        }

        debug!(
            sessions = self.sessions.len(),
            repairs = report.repairs.len(),
            "Loaded sessions"
        );
        report
    }
}

fn smallest_unused(used: &BTreeSet<u32>) -> u32 {
    let mut candidate = 1;
    while used.contains(&candidate) {
        candidate += 1;
    }
    candidate
}

/// Converts stored sessions, keeping valid numbers and assigning the smallest
/// free number to sessions with a missing, zero, or duplicate one.
fn repair_session_numbers(stored: Vec<StoredSession>, report: &mut LoadReport) -> Vec<Session> {
    let mut used = BTreeSet::new();
    let mut claimed: Vec<Option<u32>> = Vec::with_capacity(stored.len());
    for entry in &stored {
        match entry.session_number {
            Some(n) if n > 0 && used.insert(n) => claimed.push(Some(n)),
            _ => claimed.push(None),
        }
    }

    stored
        .into_iter()
        .zip(claimed)
        .map(|(entry, number)| {
            let session_number = match number {
                Some(n) => n,
                None => {
                    let n = smallest_unused(&used);
                    used.insert(n);
                    info!(session_id = %entry.id, number = n, "Assigned missing session number");
                    report.repairs.push(Repair::AssignedSessionNumber {
                        id: entry.id.clone(),
                        number: n,
                    });
                    n
                }
            };
            Session {
                id: entry.id,
                name: entry.name,
                session_number,
                selected_services: dedup_services(entry.selected_services),
                mode: entry.mode,
                service_urls: entry.service_urls,
                chat_history: entry
                    .chat_history
                    .into_iter()
                    .map(|(service, history)| {
                        let history = history
                            .into_iter()
                            .filter(|m| m.role.is_persistent())
                            .collect();
                        (service, history)
                    })
                    .collect(),
                prompt_draft: entry.prompt_draft,
                created_at: entry
                    .created_at
                    .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            }
        })
        .collect()
}

fn dedup_services(services: Vec<ServiceKey>) -> Vec<ServiceKey> {
    let mut seen = BTreeSet::new();
    services
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
