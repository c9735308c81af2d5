use super::host::{PanelHost, PendingLoad, SurfaceSpec};
use super::instance::{ContentMode, LoadState, PanelContent, PanelInstance, Transcript};
use super::key::PanelKey;
use crate::error::{PolyviewError, Result};
use crate::service::{ServiceKey, ServiceRegistry};
use crate::session::{ChatMessage, Session, SessionId, UrlSource};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of a visibility reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Panels now visible, in display order.
    pub visible: Vec<PanelKey>,
    /// Selected services with no registry entry (or whose surface failed).
    pub skipped: Vec<ServiceKey>,
    /// The current session has no mode yet; the user must pick one.
    pub needs_mode_prompt: bool,
}

/// Creates, caches, shows and hides panels.
///
/// Exactly one [`PanelInstance`] exists per [`PanelKey`]. Panels are never
/// destroyed while their session lives; hiding detaches the host surface
/// and keeps everything else intact.
pub struct PanelMultiplexer<H: PanelHost> {
    host: H,
    registry: ServiceRegistry,
    panels: HashMap<PanelKey, PanelInstance>,
    pending_loads: Vec<PendingLoad>,
}

impl<H: PanelHost> PanelMultiplexer<H> {
    pub fn new(host: H, registry: ServiceRegistry) -> Self {
        Self {
            host,
            registry,
            panels: HashMap::new(),
            pending_loads: Vec::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn panel(&self, key: &PanelKey) -> Option<&PanelInstance> {
        self.panels.get(key)
    }

    pub fn panel_mut(&mut self, key: &PanelKey) -> Option<&mut PanelInstance> {
        self.panels.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Visible panels ordered by display index.
    pub fn visible_keys(&self) -> Vec<PanelKey> {
        let mut visible: Vec<(usize, &PanelKey)> = self
            .panels
            .values()
            .filter_map(|p| p.display_index.filter(|_| p.visible).map(|i| (i, &p.key)))
            .collect();
        visible.sort_by_key(|(index, _)| *index);
        visible.into_iter().map(|(_, key)| key.clone()).collect()
    }

    /// Returns the cached panel for (`session`, `service`) when its content
    /// mode matches, otherwise builds a new one, discarding a stale instance
    /// first.
    ///
    /// Returns `None` (after logging) when the service is unknown or the host
    /// cannot create a surface.
    pub fn get_or_create(
        &mut self,
        session: &Session,
        service: &ServiceKey,
        mode: ContentMode,
    ) -> Option<&mut PanelInstance> {
        let key = self.ensure(session, service, mode)?;
        self.panels.get_mut(&key)
    }

    fn ensure(
        &mut self,
        session: &Session,
        service: &ServiceKey,
        mode: ContentMode,
    ) -> Option<PanelKey> {
        let key = PanelKey::new(session.id.clone(), service.clone());

        match self.panels.get(&key).map(|p| p.content_mode) {
            Some(existing) if existing == mode => return Some(key),
            Some(existing) => {
                debug!(
                    panel = %key,
                    ?existing,
                    wanted = ?mode,
                    "Recreating panel after mode change"
                );
                self.discard(&key);
            }
            None => {}
        }

        let Some(config) = self.registry.get(service) else {
            warn!(panel = %key, "No service configuration for panel, skipping");
            return None;
        };

        let url = session
            .service_urls
            .get(service)
            .map(String::as_str)
            .unwrap_or(config.default_url.as_str());
        let spec = SurfaceSpec {
            key: &key,
            service: config,
            content_mode: mode,
            url: (mode == ContentMode::Interactive).then_some(url),
        };
        let created = match self.host.create_surface(spec) {
            Ok(created) => created,
            Err(err) => {
                warn!(panel = %key, error = %err, "Host failed to create surface, skipping");
                return None;
            }
        };

        let content = match mode {
            ContentMode::Interactive => PanelContent::Interactive {
                url: url.to_string(),
                load_state: if created.load.is_some() {
                    LoadState::Loading
                } else {
                    LoadState::Ready
                },
            },
            ContentMode::DirectCall => {
                let history: Vec<ChatMessage> = session
                    .chat_history
                    .get(service)
                    .map(|h| h.iter().filter(|m| m.role.is_persistent()).cloned().collect())
                    .unwrap_or_default();
                PanelContent::DirectCall(Transcript::restore(&history))
            }
        };

        if let Some(receiver) = created.load {
            self.pending_loads.push(PendingLoad {
                key: key.clone(),
                receiver,
            });
        }

        debug!(panel = %key, ?mode, "Created panel");
        self.panels.insert(
            key.clone(),
            PanelInstance {
                key: key.clone(),
                surface: created.id,
                content_mode: mode,
                visible: false,
                display_index: None,
                content,
            },
        );
        Some(key)
    }

    /// Attaches or detaches a panel without touching its content.
    ///
    /// A panel shown this way keeps its previous display index if it is
    /// already visible, otherwise it goes after the currently visible ones.
    /// Returns `false` for unknown keys.
    pub fn set_visible(&mut self, key: &PanelKey, visible: bool) -> bool {
        let next_index = self.panels.values().filter(|p| p.visible).count();
        let Some(panel) = self.panels.get_mut(key) else {
            return false;
        };
        if visible {
            let index = panel.display_index.unwrap_or(next_index);
            show(&mut self.host, panel, index);
        } else {
            hide(&mut self.host, panel);
        }
        true
    }

    /// Brings panel visibility in line with the current session.
    ///
    /// 1. Hides panels of every other session.
    /// 2. Ensures a visible panel with the right content mode for each
    ///    selected service of the current session, in selection order.
    /// 3. Hides current-session panels that are no longer selected.
    pub fn reconcile(
        &mut self,
        sessions: &[Session],
        current: Option<&SessionId>,
    ) -> RenderOutcome {
        let mut outcome = RenderOutcome::default();

        for panel in self.panels.values_mut() {
            if current.is_none_or(|id| !panel.key.belongs_to(id)) {
                hide(&mut self.host, panel);
            }
        }

        let Some(session) = current.and_then(|id| sessions.iter().find(|s| &s.id == id)) else {
            return outcome;
        };

        let Some(mode) = ContentMode::for_session(session.mode) else {
            for panel in self.panels.values_mut() {
                if panel.key.belongs_to(&session.id) {
                    hide(&mut self.host, panel);
                }
            }
            outcome.needs_mode_prompt = true;
            return outcome;
        };

        for service in &session.selected_services {
            let Some(key) = self.ensure(session, service, mode) else {
                outcome.skipped.push(service.clone());
                continue;
            };
            if let Some(panel) = self.panels.get_mut(&key) {
                show(&mut self.host, panel, outcome.visible.len());
                outcome.visible.push(key);
            }
        }

        for panel in self.panels.values_mut() {
            if panel.key.belongs_to(&session.id) && !session.is_selected(&panel.key.service) {
                hide(&mut self.host, panel);
            }
        }

        outcome
    }

    /// Destroys every panel of `session_id`. Returns how many were removed.
    pub fn remove_session(&mut self, session_id: &SessionId) -> usize {
        let keys: Vec<PanelKey> = self
            .panels
            .keys()
            .filter(|k| k.belongs_to(session_id))
            .cloned()
            .collect();
        for key in &keys {
            self.discard(key);
        }
        self.pending_loads.retain(|p| !p.key.belongs_to(session_id));
        keys.len()
    }

    fn discard(&mut self, key: &PanelKey) {
        if let Some(panel) = self.panels.remove(key) {
            if panel.visible {
                self.host.detach(panel.surface);
            }
            self.host.destroy(panel.surface);
            self.pending_loads.retain(|p| &p.key != key);
            debug!(panel = %key, "Destroyed panel");
        }
    }

    /// Load signals of newly created interactive panels, for the caller to await.
    pub fn take_pending_loads(&mut self) -> Vec<PendingLoad> {
        std::mem::take(&mut self.pending_loads)
    }

    /// Records how an interactive panel's first load ended.
    pub fn apply_load_state(&mut self, key: &PanelKey, state: LoadState) -> bool {
        match self.panels.get_mut(key) {
            Some(panel) => {
                panel.set_load_state(state);
                true
            }
            None => false,
        }
    }

    /// Forwards `prompt` to an interactive panel.
    pub fn submit_prompt(&mut self, key: &PanelKey, prompt: &str) -> Result<()> {
        let panel = self
            .panels
            .get(key)
            .ok_or_else(|| PolyviewError::not_found("panel", key.to_string()))?;
        if panel.content_mode != ContentMode::Interactive {
            return Err(PolyviewError::invalid_state(format!("panel {key} is not interactive")));
        }
        self.host.submit_prompt(panel.surface, prompt)
    }
}

impl<H: PanelHost> UrlSource for PanelMultiplexer<H> {
    fn capture_urls(&self, session_id: &SessionId) -> Vec<(ServiceKey, Result<String>)> {
        let mut captured: Vec<(ServiceKey, Result<String>)> = self
            .panels
            .values()
            .filter(|p| p.key.belongs_to(session_id) && p.content_mode == ContentMode::Interactive)
            .map(|p| (p.key.service.clone(), self.host.current_url(p.surface)))
            .collect();
        captured.sort_by(|a, b| a.0.cmp(&b.0));
        captured
    }
}

fn show<H: PanelHost>(host: &mut H, panel: &mut PanelInstance, index: usize) {
    if panel.visible && panel.display_index == Some(index) {
        return;
    }
    host.attach(panel.surface, index);
    panel.visible = true;
    panel.display_index = Some(index);
}

fn hide<H: PanelHost>(host: &mut H, panel: &mut PanelInstance) {
    if !panel.visible {
        return;
    }
    host.detach(panel.surface);
    panel.visible = false;
    panel.display_index = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::host::{CreatedSurface, LoadOutcome, SurfaceId};
    use crate::service::ServiceConfig;
    use crate::session::SessionMode;
    use std::collections::{BTreeMap, HashSet};
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum HostEvent {
        Create(SurfaceId, ContentMode, Option<String>),
        Attach(SurfaceId, usize),
        Detach(SurfaceId),
        Destroy(SurfaceId),
    }

    #[derive(Default)]
    struct RecordingHost {
        next_id: u64,
        events: Vec<HostEvent>,
        urls: HashMap<SurfaceId, String>,
        broken: HashSet<SurfaceId>,
        load_senders: Vec<oneshot::Sender<LoadOutcome>>,
    }

    impl PanelHost for RecordingHost {
        fn create_surface(&mut self, spec: SurfaceSpec<'_>) -> Result<CreatedSurface> {
            self.next_id += 1;
            let id = SurfaceId(self.next_id);
            self.events.push(HostEvent::Create(
                id,
                spec.content_mode,
                spec.url.map(str::to_string),
            ));
            if let Some(url) = spec.url {
                self.urls.insert(id, url.to_string());
            }
            if spec.content_mode == ContentMode::Interactive {
                let (tx, rx) = oneshot::channel();
                self.load_senders.push(tx);
                Ok(CreatedSurface { id, load: Some(rx) })
            } else {
                Ok(CreatedSurface::immediate(id))
            }
        }

        fn attach(&mut self, surface: SurfaceId, display_index: usize) {
            self.events.push(HostEvent::Attach(surface, display_index));
        }

        fn detach(&mut self, surface: SurfaceId) {
            self.events.push(HostEvent::Detach(surface));
        }

        fn destroy(&mut self, surface: SurfaceId) {
            self.events.push(HostEvent::Destroy(surface));
        }

        fn current_url(&self, surface: SurfaceId) -> Result<String> {
            if self.broken.contains(&surface) {
                return Err(PolyviewError::internal("surface crashed"));
            }
            self.urls
                .get(&surface)
                .cloned()
                .ok_or_else(|| PolyviewError::not_found("surface", surface.0.to_string()))
        }

        fn submit_prompt(&mut self, _surface: SurfaceId, _prompt: &str) -> Result<()> {
            Ok(())
        }
    }

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new()
            .with("x", ServiceConfig::new("X", "https://x.example"))
            .with("y", ServiceConfig::new("Y", "https://y.example"))
            .with("z", ServiceConfig::new("Z", "https://z.example"))
    }

    fn session(id: &str, services: &[&str], mode: SessionMode) -> Session {
        Session {
            id: SessionId::new(id),
            name: None,
            session_number: 1,
            selected_services: services.iter().map(|s| ServiceKey::new(*s)).collect(),
            mode,
            service_urls: BTreeMap::new(),
            chat_history: BTreeMap::new(),
            prompt_draft: String::new(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn key(session: &str, service: &str) -> PanelKey {
        PanelKey::new(session.into(), service.into())
    }

    #[test]
    fn test_get_or_create_caches_per_key_and_mode() {
        let mut mux = PanelMultiplexer::new(RecordingHost::default(), registry());
        let s = session("s1", &["x"], SessionMode::Interactive);

        let first = mux
            .get_or_create(&s, &"x".into(), ContentMode::Interactive)
            .unwrap()
            .surface();
        let second = mux
            .get_or_create(&s, &"x".into(), ContentMode::Interactive)
            .unwrap()
            .surface();
        assert_eq!(first, second);
        assert_eq!(mux.len(), 1);

        let third = mux
            .get_or_create(&s, &"x".into(), ContentMode::DirectCall)
            .unwrap()
            .surface();
        assert_ne!(first, third);
        assert_eq!(mux.len(), 1);
        assert!(mux.host().events.contains(&HostEvent::Destroy(first)));
    }

    #[test]
    fn test_unknown_service_is_skipped() {
        let mut mux = PanelMultiplexer::new(RecordingHost::default(), registry());
        let s = session("s1", &["x", "nope", "y"], SessionMode::DirectCall);

        assert!(mux.get_or_create(&s, &"nope".into(), ContentMode::DirectCall).is_none());

        let outcome = mux.reconcile(std::slice::from_ref(&s), Some(&s.id));
        assert_eq!(outcome.visible, vec![key("s1", "x"), key("s1", "y")]);
        assert_eq!(outcome.skipped, vec![ServiceKey::new("nope")]);
    }

    #[test]
    fn test_reconcile_switches_sessions_without_destroying() {
        let mut mux = PanelMultiplexer::new(RecordingHost::default(), registry());
        let a = session("a", &["x", "y"], SessionMode::Interactive);
        let b = session("b", &["y"], SessionMode::DirectCall);
        let sessions = vec![a.clone(), b.clone()];

        mux.reconcile(&sessions, Some(&a.id));
        let outcome = mux.reconcile(&sessions, Some(&b.id));
        assert_eq!(outcome.visible, vec![key("b", "y")]);
        assert!(!mux.panel(&key("a", "x")).unwrap().is_visible());
        assert_eq!(mux.len(), 3);

        let outcome = mux.reconcile(&sessions, Some(&a.id));
        assert_eq!(outcome.visible, vec![key("a", "x"), key("a", "y")]);
        assert_eq!(mux.len(), 3);
        let destroyed = mux
            .host()
            .events
            .iter()
            .filter(|e| matches!(e, HostEvent::Destroy(_)))
            .count();
        assert_eq!(destroyed, 0);
    }

    #[test]
    fn test_reconcile_hides_deselected_and_follows_order() {
        let mut mux = PanelMultiplexer::new(RecordingHost::default(), registry());
        let mut s = session("s", &["x", "y", "z"], SessionMode::DirectCall);

        mux.reconcile(std::slice::from_ref(&s), Some(&s.id));
        s.deselect_service(&"y".into());
        s.move_service(&"z".into(), 0);
        let outcome = mux.reconcile(std::slice::from_ref(&s), Some(&s.id));

        assert_eq!(outcome.visible, vec![key("s", "z"), key("s", "x")]);
        assert_eq!(mux.panel(&key("s", "z")).unwrap().display_index(), Some(0));
        assert!(!mux.panel(&key("s", "y")).unwrap().is_visible());
        assert_eq!(mux.visible_keys(), outcome.visible);
    }

    #[test]
    fn test_unset_mode_requests_prompt() {
        let mut mux = PanelMultiplexer::new(RecordingHost::default(), registry());
        let s = session("s", &["x"], SessionMode::Unset);
        let outcome = mux.reconcile(std::slice::from_ref(&s), Some(&s.id));
        assert!(outcome.needs_mode_prompt);
        assert!(outcome.visible.is_empty());
        assert!(mux.is_empty());
    }

    #[test]
    fn test_hide_and_show_preserves_content() {
        let mut mux = PanelMultiplexer::new(RecordingHost::default(), registry());
        let mut s = session("s", &["x"], SessionMode::DirectCall);
        s.chat_history
            .insert("x".into(), vec![ChatMessage::user("q"), ChatMessage::assistant("a")]);
        mux.reconcile(std::slice::from_ref(&s), Some(&s.id));

        let k = key("s", "x");
        mux.panel_mut(&k)
            .unwrap()
            .transcript_mut()
            .unwrap()
            .push_notice("Rate limited");
        let before = mux.panel(&k).unwrap().content().clone();

        assert!(mux.set_visible(&k, false));
        assert!(mux.set_visible(&k, true));
        assert!(mux.set_visible(&k, true));

        let panel = mux.panel(&k).unwrap();
        assert!(panel.is_visible());
        assert_eq!(panel.content(), &before);
        assert_eq!(panel.transcript().unwrap().entries.len(), 3);
        assert!(!mux.set_visible(&key("s", "missing"), true));
    }

    #[test]
    fn test_interactive_panel_uses_saved_url() {
        let mut mux = PanelMultiplexer::new(RecordingHost::default(), registry());
        let mut s = session("s", &["x", "y"], SessionMode::Interactive);
        s.service_urls.insert("x".into(), "https://x.example/c/42".to_string());
        mux.reconcile(std::slice::from_ref(&s), Some(&s.id));

        let creates: Vec<Option<String>> = mux
            .host()
            .events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Create(_, _, url) => Some(url.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            creates,
            vec![
                Some("https://x.example/c/42".to_string()),
                Some("https://y.example".to_string())
            ]
        );
        assert_eq!(mux.take_pending_loads().len(), 2);
        assert!(mux.take_pending_loads().is_empty());
    }

    #[test]
    fn test_capture_urls_reports_failures_per_service() {
        let mut mux = PanelMultiplexer::new(RecordingHost::default(), registry());
        let s = session("s", &["x", "y"], SessionMode::Interactive);
        mux.reconcile(std::slice::from_ref(&s), Some(&s.id));
        let broken = mux.panel(&key("s", "y")).unwrap().surface();
        mux.host_mut().broken.insert(broken);

        let captured = mux.capture_urls(&s.id);
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].0, ServiceKey::new("x"));
        assert_eq!(captured[0].1.as_deref().ok(), Some("https://x.example"));
        assert!(captured[1].1.is_err());
    }

    #[test]
    fn test_remove_session_destroys_only_its_panels() {
        let mut mux = PanelMultiplexer::new(RecordingHost::default(), registry());
        let a = session("a", &["x", "y"], SessionMode::Interactive);
        let b = session("b", &["x"], SessionMode::Interactive);
        let sessions = vec![a.clone(), b.clone()];
        mux.reconcile(&sessions, Some(&b.id));
        mux.reconcile(&sessions, Some(&a.id));

        assert_eq!(mux.remove_session(&a.id), 2);
        assert_eq!(mux.len(), 1);
        assert!(mux.panel(&key("b", "x")).is_some());
        assert_eq!(mux.take_pending_loads().len(), 1);
    }
}
