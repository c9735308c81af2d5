//! Panel multiplexing.
//!
//! One visual panel per (session, service) pair, created lazily, hidden
//! instead of destroyed, and torn down only with its session.
//!
//! - `key`: Composite panel identifier (`PanelKey`)
//! - `host`: Embedding host seam (`PanelHost`) and load signalling
//! - `instance`: Cached panel state (`PanelInstance`, `ContentMode`)
//! - `multiplexer`: Lifecycle and visibility reconciliation (`PanelMultiplexer`)

mod host;
mod instance;
mod key;
mod multiplexer;

pub use host::{CreatedSurface, LoadOutcome, PanelHost, PendingLoad, SurfaceId, SurfaceSpec};
pub use instance::{ContentMode, LoadState, PanelContent, PanelInstance, Transcript};
pub use key::PanelKey;
pub use multiplexer::{PanelMultiplexer, RenderOutcome};
