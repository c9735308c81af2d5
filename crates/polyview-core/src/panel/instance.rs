//! Cached panel state.

use super::host::SurfaceId;
use super::key::PanelKey;
use crate::session::{ChatMessage, MessageRole, SessionMode};

/// How a panel renders its service. Must match the owning session's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentMode {
    Interactive,
    DirectCall,
}

impl ContentMode {
    /// Content mode for a session mode; `None` while the mode is unset.
    pub fn for_session(mode: SessionMode) -> Option<Self> {
        match mode {
            SessionMode::Unset => None,
            SessionMode::Interactive => Some(Self::Interactive),
            SessionMode::DirectCall => Some(Self::DirectCall),
        }
    }
}

/// Load progress of an interactive surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
    /// The load bound elapsed before the surface reported back.
    TimedOut,
}

/// Rendered transcript of a direct-call panel.
///
/// Unlike persisted history, entries here may include `System` notices
/// (request failures and similar), which live only as long as the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub entries: Vec<ChatMessage>,
    /// A request is in flight ("thinking" indicator).
    pub loading: bool,
}

impl Transcript {
    pub fn restore(history: &[ChatMessage]) -> Self {
        Self {
            entries: history.to_vec(),
            loading: false,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.entries.push(message);
    }

    pub fn push_notice(&mut self, text: impl Into<String>) {
        self.entries.push(ChatMessage::system(text));
    }

    /// Most recent assistant reply, if any.
    pub fn last_response(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelContent {
    Interactive { url: String, load_state: LoadState },
    DirectCall(Transcript),
}

/// A panel owned by the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelInstance {
    pub(crate) key: PanelKey,
    pub(crate) surface: SurfaceId,
    pub(crate) content_mode: ContentMode,
    pub(crate) visible: bool,
    pub(crate) display_index: Option<usize>,
    pub(crate) content: PanelContent,
}

impl PanelInstance {
    pub fn key(&self) -> &PanelKey {
        &self.key
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn content_mode(&self) -> ContentMode {
        self.content_mode
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Position among visible panels, `None` while hidden.
    pub fn display_index(&self) -> Option<usize> {
        self.display_index
    }

    pub fn content(&self) -> &PanelContent {
        &self.content
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        match &self.content {
            PanelContent::DirectCall(transcript) => Some(transcript),
            PanelContent::Interactive { .. } => None,
        }
    }

    pub fn transcript_mut(&mut self) -> Option<&mut Transcript> {
        match &mut self.content {
            PanelContent::DirectCall(transcript) => Some(transcript),
            PanelContent::Interactive { .. } => None,
        }
    }

    pub fn load_state(&self) -> Option<&LoadState> {
        match &self.content {
            PanelContent::Interactive { load_state, .. } => Some(load_state),
            PanelContent::DirectCall(_) => None,
        }
    }

    pub(crate) fn set_load_state(&mut self, state: LoadState) {
        if let PanelContent::Interactive { load_state, .. } = &mut self.content {
            *load_state = state;
        }
    }
}
