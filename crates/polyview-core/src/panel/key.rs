use crate::service::ServiceKey;
use crate::session::SessionId;
use std::fmt;

/// Identifies the panel of one service inside one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelKey {
    pub session_id: SessionId,
    pub service: ServiceKey,
}

impl PanelKey {
    pub fn new(session_id: SessionId, service: ServiceKey) -> Self {
        Self {
            session_id,
            service,
        }
    }

    pub fn belongs_to(&self, session_id: &SessionId) -> bool {
        &self.session_id == session_id
    }
}

impl fmt::Display for PanelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.service)
    }
}
