//! Embedding host seam.
//!
//! The host owns the actual rendering contexts (web views, widgets). The
//! multiplexer only ever refers to them through opaque [`SurfaceId`]s.

use super::instance::ContentMode;
use super::key::PanelKey;
use crate::error::Result;
use crate::service::ServiceConfig;
use tokio::sync::oneshot;

/// Opaque handle to a host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// What the host needs to build a surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSpec<'a> {
    pub key: &'a PanelKey,
    pub service: &'a ServiceConfig,
    pub content_mode: ContentMode,
    /// Initial URL for interactive surfaces.
    pub url: Option<&'a str>,
}

/// Terminal signal from an interactive surface's first load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready,
    Failed(String),
}

/// A surface returned by [`PanelHost::create_surface`].
///
/// Interactive surfaces come with a one-shot receiver that resolves when the
/// embedded content reports ready or failed.
#[derive(Debug)]
pub struct CreatedSurface {
    pub id: SurfaceId,
    pub load: Option<oneshot::Receiver<LoadOutcome>>,
}

impl CreatedSurface {
    pub fn immediate(id: SurfaceId) -> Self {
        Self { id, load: None }
    }
}

/// A load signal not yet awaited, tagged with its panel.
#[derive(Debug)]
pub struct PendingLoad {
    pub key: PanelKey,
    pub receiver: oneshot::Receiver<LoadOutcome>,
}

/// Capability provided by the embedding application.
pub trait PanelHost {
    /// Creates a detached surface.
    fn create_surface(&mut self, spec: SurfaceSpec<'_>) -> Result<CreatedSurface>;

    /// Shows `surface` at `display_index` among the visible panels.
    fn attach(&mut self, surface: SurfaceId, display_index: usize);

    /// Hides `surface` without discarding its content.
    fn detach(&mut self, surface: SurfaceId);

    /// Releases `surface` for good.
    fn destroy(&mut self, surface: SurfaceId);

    /// Current navigation URL of an interactive surface.
    fn current_url(&self, surface: SurfaceId) -> Result<String>;

    /// Types `prompt` into an interactive surface and submits it.
    fn submit_prompt(&mut self, surface: SurfaceId, prompt: &str) -> Result<()>;
}
