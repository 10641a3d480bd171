//! Contract between the controller and whatever renders the dashboard.

pub mod sinks;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::protocol::{DetectedEntityRecord, MonitoringParameters, ProgressSnapshot, SessionSummary};
use crate::session::SessionState;
use crate::telemetry::CounterSnapshot;

pub use sinks::{LogSink, SharedSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Success,
    Error,
}

/// User-facing message. Display and dismissal are up to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

impl Connectivity {
    pub fn label(self) -> &'static str {
        match self {
            Connectivity::Unknown => "Connecting",
            Connectivity::Connected => "Connected",
            Connectivity::Disconnected => "Disconnected",
        }
    }
}

/// Consistent picture of the session at one point in the inbound queue.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DashboardView {
    pub state: SessionState,
    pub parameters: Option<MonitoringParameters>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub snapshot: ProgressSnapshot,
    /// Most recent first.
    pub records: Vec<DetectedEntityRecord>,
    pub summary: Option<SessionSummary>,
    pub connectivity: Connectivity,
    pub counters: CounterSnapshot,
}

pub trait PresentationSink: Send + Sync {
    fn notify(&self, notification: Notification);

    fn render(&self, view: &DashboardView);

    fn connectivity(&self, status: Connectivity);
}
