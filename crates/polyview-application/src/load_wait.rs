//! Bounded waiting for interactive panel loads.

use polyview_core::panel::{LoadOutcome, LoadState, PanelKey, PendingLoad};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

/// Waits for every pending load, sharing one deadline `limit` from now.
///
/// Loads still running at the deadline are reported as
/// [`LoadState::TimedOut`]; a surface dropped before signalling counts as
/// failed. Never returns early on failure: each panel gets its own state.
pub async fn await_loads(pending: Vec<PendingLoad>, limit: Duration) -> Vec<(PanelKey, LoadState)> {
    let deadline = Instant::now() + limit;
    let mut states = Vec::with_capacity(pending.len());

    for PendingLoad { key, receiver } in pending {
        let state = match timeout_at(deadline, receiver).await {
            Ok(Ok(LoadOutcome::Ready)) => LoadState::Ready,
            Ok(Ok(LoadOutcome::Failed(reason))) => {
                warn!(panel = %key, reason = %reason, "Panel content failed to load");
                LoadState::Failed(reason)
            }
            Ok(Err(_)) => {
                warn!(panel = %key, "Panel surface closed before loading");
                LoadState::Failed("surface closed before loading".to_string())
            }
            Err(_) => {
                warn!(
                    panel = %key,
                    timeout_secs = limit.as_secs(),
                    "Panel load timed out, continuing"
                );
                LoadState::TimedOut
            }
        };
        debug!(panel = %key, ?state, "Panel load settled");
        states.push((key, state));
    }
    states
}
