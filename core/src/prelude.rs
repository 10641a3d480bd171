pub use crate::presentation::{Connectivity, DashboardView, Notification, PresentationSink, Severity};
pub use crate::protocol::{
    Command, CompletionReport, DetectedEntityRecord, ExportFormat, MonitoringParameters,
    ProgressSnapshot, ProgressUpdate, PushEvent, VisualizationMode,
};
pub use crate::session::{Controller, ControllerHandle, SessionState};
pub use crate::transport::{Transport, TransportError};

use crate::session::SessionState as State;

/// Failure taxonomy surfaced by every controller operation.
///
/// Every variant ends in a user-visible notification; none of them crash the
/// controller.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// Parameters were rejected locally; no command was sent.
    #[error("invalid parameters: {0}")]
    Validation(String),
    /// The command is not allowed in the current state; no command was sent.
    #[error("cannot {attempted} while the session is {state}")]
    InvalidStateTransition {
        state: State,
        attempted: &'static str,
    },
    #[error("backend rejected the request: {0}")]
    BackendRejection(String),
    #[error("connection error: {0}")]
    ConnectivityFailure(String),
    #[error("export failed: {0}")]
    ExportFailure(String),
    #[error("session controller is no longer running")]
    ControllerClosed,
}

pub type ControlResult<T> = Result<T, ControlError>;
