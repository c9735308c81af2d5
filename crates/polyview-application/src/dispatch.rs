//! Concurrent direct-call dispatch.
//!
//! Each request runs as its own tokio task and reports back over an mpsc
//! channel. A task carries the session id captured when it was dispatched,
//! so its completion lands in that session no matter which session is
//! current by the time it finishes.

use async_trait::async_trait;
use polyview_core::service::ServiceKey;
use polyview_core::session::{ChatMessage, SessionId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Failure of a direct-call request, classified for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Missing, invalid or revoked credentials.
    #[error("authorization failed: {0}")]
    Unauthorized(String),

    /// Rate limits, timeouts, network and upstream outages. Retrying later may succeed.
    #[error("temporarily unavailable: {0}")]
    Transient(String),

    #[error("request failed: {0}")]
    Unknown(String),
}

impl RequestError {
    /// Classifies a failure from an optional HTTP status and the error text.
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            Some(401 | 403) => return Self::Unauthorized(message),
            Some(408 | 429) | Some(500..=599) => return Self::Transient(message),
            _ => {}
        }

        let lower = message.to_lowercase();
        if lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("api key")
            || lower.contains("authentication")
        {
            Self::Unauthorized(message)
        } else if lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("network")
            || lower.contains("connect")
            || lower.contains("overloaded")
            || lower.contains("unavailable")
        {
            Self::Transient(message)
        } else {
            Self::Unknown(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// One-line notice shown inside the failing panel.
    pub fn notice(&self, service_name: &str) -> String {
        match self {
            Self::Unauthorized(_) => {
                format!("{service_name}: authorization failed. Check the API key for this service.")
            }
            Self::Transient(detail) => {
                format!("{service_name} is temporarily unavailable ({detail}). Try again shortly.")
            }
            Self::Unknown(detail) => format!("{service_name} request failed: {detail}"),
        }
    }
}

/// Sends a conversation to a service's API and returns the reply text.
///
/// Vendor request and response formats live entirely behind this trait.
#[async_trait]
pub trait DirectCallAdapter: Send + Sync {
    async fn complete(
        &self,
        service: &ServiceKey,
        messages: &[ChatMessage],
    ) -> Result<String, RequestError>;
}

/// One request to dispatch.
#[derive(Debug, Clone)]
pub struct DispatchTask {
    pub session_id: SessionId,
    pub service: ServiceKey,
    /// Conversation to send, oldest first, ending with the new prompt.
    pub messages: Vec<ChatMessage>,
}

/// A finished request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub session_id: SessionId,
    pub service: ServiceKey,
    pub result: Result<String, RequestError>,
}

/// Spawns request tasks and collects their completions.
pub struct Dispatcher {
    adapter: Arc<dyn DirectCallAdapter>,
    sender: mpsc::UnboundedSender<Completion>,
    receiver: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl Dispatcher {
    pub fn new(adapter: Arc<dyn DirectCallAdapter>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            adapter,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    /// Requests whose completion has not been received yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Starts `task` on the tokio runtime. Must be called from within one.
    ///
    /// Every dispatched task produces exactly one completion: a request that
    /// panics or is aborted through the returned handle completes with
    /// [`RequestError::Unknown`].
    pub fn dispatch(&mut self, task: DispatchTask) -> AbortHandle {
        let DispatchTask {
            session_id,
            service,
            messages,
        } = task;
        let adapter = Arc::clone(&self.adapter);
        let sender = self.sender.clone();
        self.in_flight += 1;
        debug!(session_id = %session_id, service = %service, "Dispatching request");

        let request_service = service.clone();
        let request =
            tokio::spawn(async move { adapter.complete(&request_service, &messages).await });
        let abort = request.abort_handle();

        tokio::spawn(async move {
            let result = match request.await {
                Ok(result) => result,
                Err(err) => {
                    warn!(
                        session_id = %session_id,
                        service = %service,
                        error = %err,
                        "Request task did not finish"
                    );
                    let reason = if err.is_panic() {
                        "request task panicked"
                    } else {
                        "request was cancelled"
                    };
                    Err(RequestError::Unknown(reason.to_string()))
                }
            };
            // The receiver lives as long as the dispatcher; a send error means
            // the application is shutting down.
            let _ = sender.send(Completion {
                session_id,
                service,
                result,
            });
        });
        abort
    }

    /// Waits for the next completion, or `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.receiver.recv().await?;
        self.in_flight -= 1;
        Some(completion)
    }

    /// A completion that is already available, without waiting.
    pub fn try_next_completion(&mut self) -> Option<Completion> {
        let completion = self.receiver.try_recv().ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(completion)
    }
}
