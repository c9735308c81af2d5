//! Orchestrator.
//!
//! Turns user actions into calls on the session store, chat history, panel
//! multiplexer and layout engine. Every action method is synchronous and
//! completes before returning; only request completions and panel loads are
//! awaited, and both go through explicit async methods.

use crate::crosscheck;
use crate::dispatch::{Completion, DirectCallAdapter, DispatchTask, Dispatcher};
use crate::load_wait::await_loads;
use polyview_core::config::AppConfig;
use polyview_core::error::{PolyviewError, Result};
use polyview_core::layout::{
    Divider, GridAxis, LayoutEngine, LayoutError, LayoutRecord, PanelRect, Point, Rect, Topology,
};
use polyview_core::panel::{
    ContentMode, LoadState, PanelHost, PanelKey, PanelMultiplexer, RenderOutcome,
};
use polyview_core::preferences::Preferences;
use polyview_core::service::{ServiceKey, ServiceRegistry};
use polyview_core::session::{
    ChatHistoryManager, ChatMessage, LoadOptions, LoadReport, MessageRole, Session, SessionId,
    SessionMode, SessionStore,
};
use polyview_core::store::KeyValueStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The divider a resize gesture grabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeTarget {
    /// Divider after the panel at this display index.
    Linear(usize),
    /// Divider after column or row `index`.
    Grid(GridAxis, usize),
}

pub struct Orchestrator<H: PanelHost> {
    config: AppConfig,
    sessions: SessionStore,
    history: ChatHistoryManager,
    panels: PanelMultiplexer<H>,
    layout: LayoutEngine,
    preferences: Preferences,
    dispatcher: Dispatcher,
}

impl<H: PanelHost> Orchestrator<H> {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: AppConfig,
        host: H,
        registry: ServiceRegistry,
        adapter: Arc<dyn DirectCallAdapter>,
    ) -> Self {
        let preferences = Preferences::new(Arc::clone(&store));
        let layout = LayoutEngine::new(Arc::clone(&store), &config, preferences.layout_mode());
        Self {
            sessions: SessionStore::new(store, &config),
            history: ChatHistoryManager::from_config(&config),
            panels: PanelMultiplexer::new(host, registry),
            layout,
            preferences,
            dispatcher: Dispatcher::new(adapter),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn panels(&self) -> &PanelMultiplexer<H> {
        &self.panels
    }

    pub fn panels_mut(&mut self) -> &mut PanelMultiplexer<H> {
        &mut self.panels
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn history(&self) -> &ChatHistoryManager {
        &self.history
    }

    /// Requests dispatched but not yet applied.
    pub fn requests_in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    // ============================================================================
    // Startup and rendering
    // ============================================================================

    /// Restores persisted sessions, repairing stale state, and persists the
    /// repaired result.
    pub fn startup(&mut self) -> LoadReport {
        let default_mode = self.config.default_mode.initial_mode();
        let report = self.sessions.load(LoadOptions {
            default_services: self.preferences.default_services_for(default_mode),
            default_mode,
        });
        if !report.is_clean() {
            info!(repairs = report.repairs.len(), "Persisting repaired session state");
            self.persist();
        }
        report
    }

    /// Reconciles panel visibility with the current session.
    pub fn render(&mut self) -> RenderOutcome {
        let outcome = self
            .panels
            .reconcile(self.sessions.sessions(), self.sessions.current_session_id());
        if !outcome.skipped.is_empty() {
            warn!(skipped = ?outcome.skipped, "Some selected services have no panel");
        }
        outcome
    }

    /// Waits, at most the configured load timeout, for panels created since
    /// the last call to finish loading.
    pub async fn await_panel_loads(&mut self) -> Vec<(PanelKey, LoadState)> {
        let pending = self.panels.take_pending_loads();
        if pending.is_empty() {
            return Vec::new();
        }
        let states = await_loads(pending, self.config.load_timeout()).await;
        for (key, state) in &states {
            self.panels.apply_load_state(key, state.clone());
        }
        states
    }

    // ============================================================================
    // Sessions
    // ============================================================================

    pub fn current_session(&self) -> Option<&Session> {
        self.sessions.current_session()
    }

    /// Keeps unsent input on the current session; written on the next save.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        if let Some(session) = self.sessions.current_session_mut() {
            session.prompt_draft = text.into();
        }
    }

    /// Opens a new session with the configured default mode and services and
    /// makes it current.
    pub fn new_session(&mut self, name: Option<String>) -> SessionId {
        self.persist();

        let mode = self.config.default_mode.initial_mode();
        let services = self.preferences.default_services_for(mode);
        let session = self.sessions.create_session(name, Some(services), Some(mode));
        let id = session.id.clone();
        self.sessions.add_session(session);
        self.sessions.set_current_session(&id);
        info!(session_id = %id, "Opened session");

        self.persist();
        id
    }

    /// Makes `id` current. The outgoing session (URLs, draft) is saved first.
    pub fn switch_session(&mut self, id: &SessionId) -> Result<RenderOutcome> {
        self.sessions.require(id)?;
        self.persist();
        self.sessions.set_current_session(id);
        self.persist();
        debug!(session_id = %id, "Switched session");
        Ok(self.render())
    }

    /// Closes `id` and destroys its panels. Closing the last session opens a
    /// fresh default one.
    pub fn close_session(&mut self, id: &SessionId) -> Result<RenderOutcome> {
        self.sessions.require(id)?;
        let was_current = self.sessions.current_session_id() == Some(id);

        let destroyed = self.panels.remove_session(id);
        self.sessions.remove_session(id);
        info!(session_id = %id, panels = destroyed, "Closed session");

        if self.sessions.sessions().is_empty() {
            let mode = self.config.default_mode.initial_mode();
            let services = self.preferences.default_services_for(mode);
            let session = self.sessions.create_session(None, Some(services), Some(mode));
            let replacement = session.id.clone();
            self.sessions.add_session(session);
            self.sessions.set_current_session(&replacement);
        } else if was_current {
            let first = self.sessions.sessions()[0].id.clone();
            self.sessions.set_current_session(&first);
        }

        self.persist();
        Ok(self.render())
    }

    pub fn rename_session(&mut self, id: &SessionId, name: Option<String>) -> Result<()> {
        let session = self
            .sessions
            .session_mut(id)
            .ok_or_else(|| PolyviewError::not_found("session", id.as_str()))?;
        session.name = name.filter(|n| !n.trim().is_empty());
        self.persist();
        Ok(())
    }

    /// Answers the mode prompt of the current session.
    ///
    /// A session's mode is chosen once. A session with no services yet gets
    /// the configured defaults for the chosen mode.
    pub fn choose_mode(&mut self, mode: SessionMode) -> Result<RenderOutcome> {
        if !mode.is_set() {
            return Err(PolyviewError::invalid_state("cannot choose the unset mode"));
        }
        let defaults = self.preferences.default_services_for(mode);
        let session = self.current_session_mut()?;
        if session.mode.is_set() && session.mode != mode {
            return Err(PolyviewError::invalid_state(format!(
                "session {} already uses {:?} mode",
                session.id, session.mode
            )));
        }
        session.mode = mode;
        if session.selected_services.is_empty() {
            for service in defaults {
                session.select_service(service);
            }
        }
        info!(session_id = %session.id, ?mode, "Session mode chosen");

        self.persist();
        Ok(self.render())
    }

    /// Selects or deselects `service` in the current session.
    pub fn toggle_service(&mut self, service: ServiceKey) -> Result<RenderOutcome> {
        let session = self.current_session_mut()?;
        let selected = session.toggle_service(service.clone());
        debug!(service = %service, selected, "Toggled service");
        self.persist();
        Ok(self.render())
    }

    /// Drag-reorder: moves `service` to `target_index` in display order.
    pub fn move_service(
        &mut self,
        service: &ServiceKey,
        target_index: usize,
    ) -> Result<RenderOutcome> {
        let session = self.current_session_mut()?;
        if !session.move_service(service, target_index) {
            return Err(PolyviewError::not_found("selected service", service.as_str()));
        }
        self.persist();
        Ok(self.render())
    }

    fn current_session_mut(&mut self) -> Result<&mut Session> {
        self.sessions
            .current_session_mut()
            .ok_or_else(|| PolyviewError::not_found("session", "current"))
    }

    /// Saves sessions; failures are logged and state stays in memory.
    fn persist(&mut self) {
        if let Err(err) = self.sessions.save(&self.panels) {
            warn!(error = %err, "Failed to persist sessions");
        }
    }

    // ============================================================================
    // Layout
    // ============================================================================

    /// Switches topology and remembers the choice.
    pub fn set_topology(&mut self, topology: Topology) {
        if let Err(err) = self.preferences.set_layout_mode(topology) {
            warn!(error = %err, %topology, "Failed to persist layout mode");
        }
        self.layout.set_topology(topology);
    }

    pub fn set_container(&mut self, container: Rect) {
        self.layout.set_container(container);
    }

    /// Rectangles of the visible panels, in display order.
    pub fn panel_rects(&self) -> Vec<PanelRect> {
        self.layout.panel_rects(&self.visible_services())
    }

    pub fn dividers(&self) -> Vec<Divider> {
        self.layout.dividers(&self.visible_services())
    }

    pub fn begin_resize(
        &mut self,
        target: ResizeTarget,
        pointer: Point,
    ) -> std::result::Result<(), LayoutError> {
        let rects = self.panel_rects();
        match target {
            ResizeTarget::Linear(divider) => {
                self.layout.begin_linear_drag(&rects, divider, pointer)
            }
            ResizeTarget::Grid(axis, divider) => {
                self.layout.begin_grid_drag(&rects, axis, divider, pointer)
            }
        }
    }

    pub fn drag_resize(&mut self, pointer: Point) -> std::result::Result<(), LayoutError> {
        self.layout.drag_to(pointer)
    }

    /// Pointer release; persists the topology's layout record.
    pub fn end_resize(&mut self) -> std::result::Result<LayoutRecord, LayoutError> {
        let rects = self.panel_rects();
        self.layout.end_drag(&rects)
    }

    fn visible_services(&self) -> Vec<ServiceKey> {
        self.panels
            .visible_keys()
            .into_iter()
            .map(|key| key.service)
            .collect()
    }

    // ============================================================================
    // Prompts
    // ============================================================================

    /// Sends `text` to every service of the current session and clears the
    /// draft. Returns how many services received it.
    ///
    /// Direct-call sessions record the prompt in each history and dispatch
    /// one concurrent request per service, so this must run inside a tokio
    /// runtime. Interactive sessions hand the text to each visible surface.
    pub fn send_prompt(&mut self, text: &str) -> Result<usize> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(0);
        }
        let session = self
            .sessions
            .current_session()
            .ok_or_else(|| PolyviewError::not_found("session", "current"))?;
        let session_id = session.id.clone();
        let selected = session.selected_services.clone();

        let sent = match ContentMode::for_session(session.mode) {
            None => {
                return Err(PolyviewError::invalid_state(
                    "choose a session mode before sending prompts",
                ));
            }
            Some(ContentMode::Interactive) => {
                let mut sent = 0;
                for key in self.panels.visible_keys() {
                    if !key.belongs_to(&session_id) {
                        continue;
                    }
                    match self.panels.submit_prompt(&key, text) {
                        Ok(()) => sent += 1,
                        Err(err) => warn!(panel = %key, error = %err, "Failed to submit prompt"),
                    }
                }
                sent
            }
            Some(ContentMode::DirectCall) => {
                let mut sent = 0;
                for service in &selected {
                    if !self.panels.registry().contains(service) {
                        warn!(service = %service, "Unknown service, prompt not sent");
                        continue;
                    }
                    self.dispatch_prompt(&session_id, service, text)?;
                    sent += 1;
                }
                sent
            }
        };

        if let Some(session) = self.sessions.session_mut(&session_id) {
            session.prompt_draft.clear();
        }
        self.persist();
        debug!(session_id = %session_id, sent, "Prompt sent");
        Ok(sent)
    }

    /// Asks each service of the current direct-call session to review the
    /// other services' latest replies. Returns how many prompts went out.
    pub fn crosscheck(&mut self) -> Result<usize> {
        let session = self
            .sessions
            .current_session()
            .ok_or_else(|| PolyviewError::not_found("session", "current"))?;
        if session.mode != SessionMode::DirectCall {
            return Err(PolyviewError::invalid_state(
                "crosscheck needs a direct-call session",
            ));
        }
        let session_id = session.id.clone();
        let selected: Vec<ServiceKey> = session
            .selected_services
            .iter()
            .filter(|s| self.panels.registry().contains(s))
            .cloned()
            .collect();

        let latest: BTreeMap<ServiceKey, String> = selected
            .iter()
            .filter_map(|service| {
                self.history
                    .read(&self.sessions, &session_id, service)
                    .into_iter()
                    .rev()
                    .find(|m| m.role == MessageRole::Assistant)
                    .map(|m| (service.clone(), m.content))
            })
            .collect();

        let template = self.preferences.crosscheck_template();
        let prompts =
            crosscheck::build_prompts(&template, &selected, &latest, self.panels.registry());
        for (service, prompt) in &prompts {
            self.dispatch_prompt(&session_id, service, prompt)?;
        }
        info!(session_id = %session_id, prompts = prompts.len(), "Crosscheck dispatched");
        Ok(prompts.len())
    }

    fn dispatch_prompt(
        &mut self,
        session_id: &SessionId,
        service: &ServiceKey,
        prompt: &str,
    ) -> Result<()> {
        match self.history.append(
            &mut self.sessions,
            &self.panels,
            session_id,
            service,
            MessageRole::User,
            prompt,
        ) {
            Err(err) if err.is_not_found() => return Err(err),
            Err(err) => warn!(error = %err, "Prompt recorded in memory only"),
            Ok(_) => {}
        }
        let messages = self.history.read(&self.sessions, session_id, service);

        let key = PanelKey::new(session_id.clone(), service.clone());
        if let Some(transcript) = self.panels.panel_mut(&key).and_then(|p| p.transcript_mut()) {
            transcript.push(ChatMessage::user(prompt));
            transcript.loading = true;
        }

        self.dispatcher.dispatch(DispatchTask {
            session_id: session_id.clone(),
            service: service.clone(),
            messages,
        });
        Ok(())
    }

    // ============================================================================
    // Completions
    // ============================================================================

    /// Writes a finished request into the session it was dispatched from.
    ///
    /// Replies go to that session's history and, if its panel exists, to the
    /// panel transcript, even when another session is current. Failures
    /// become a notice in that panel only and are not persisted.
    pub fn apply_completion(&mut self, completion: Completion) {
        let Completion {
            session_id,
            service,
            result,
        } = completion;
        let key = PanelKey::new(session_id.clone(), service.clone());

        match result {
            Ok(reply) => {
                match self.history.append(
                    &mut self.sessions,
                    &self.panels,
                    &session_id,
                    &service,
                    MessageRole::Assistant,
                    reply.as_str(),
                ) {
                    Err(err) if err.is_not_found() => {
                        debug!(panel = %key, "Session closed before reply arrived, dropping it");
                        return;
                    }
                    Err(err) => warn!(panel = %key, error = %err, "Reply recorded in memory only"),
                    Ok(_) => {}
                }
                if let Some(transcript) =
                    self.panels.panel_mut(&key).and_then(|p| p.transcript_mut())
                {
                    transcript.push(ChatMessage::assistant(reply));
                    transcript.loading = false;
                }
            }
            Err(error) => {
                let name = self.panels.registry().display_name(&service);
                warn!(panel = %key, error = %error, "Request failed");
                if let Some(transcript) =
                    self.panels.panel_mut(&key).and_then(|p| p.transcript_mut())
                {
                    transcript.push_notice(error.notice(&name));
                    transcript.loading = false;
                }
            }
        }
    }

    /// Waits for the next request to finish and applies it. Returns `false`
    /// when nothing is in flight.
    pub async fn process_next_completion(&mut self) -> bool {
        match self.dispatcher.next_completion().await {
            Some(completion) => {
                self.apply_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Applies completions until no request is in flight. Returns how many
    /// were applied.
    pub async fn drain_completions(&mut self) -> usize {
        let mut applied = 0;
        while self.process_next_completion().await {
            applied += 1;
        }
        applied
    }

    /// Applies completions that have already arrived, without waiting. For
    /// hosts that poll from their own event loop.
    pub fn apply_ready_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.dispatcher.try_next_completion() {
            self.apply_completion(completion);
            applied += 1;
        }
        applied
    }

    /// Saves everything; call on application close.
    pub fn shutdown(&mut self) {
        self.persist();
        info!(in_flight = self.dispatcher.in_flight(), "Orchestrator shut down");
    }
}
