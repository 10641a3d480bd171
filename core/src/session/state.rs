use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::protocol::MonitoringParameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Completed,
    Errored,
}

impl SessionState {
    /// Resting states may begin a new session.
    pub fn is_resting(self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Completed | SessionState::Errored
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Completed => "completed",
            SessionState::Errored => "errored",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single monitoring session owned by a controller.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(crate) state: SessionState,
    pub(crate) parameters: Option<MonitoringParameters>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) last_error: Option<String>,
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn parameters(&self) -> Option<&MonitoringParameters> {
        self.parameters.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
