//! Wire types exchanged with the monitoring backend.

pub mod command;
pub mod event;
pub mod params;
pub mod progress;

pub use command::{Command, ExportFormat, RawResponse, ReplyStatus, StatusReply};
pub use event::{DecodeError, PushEvent};
pub use params::{MonitoringParameters, VisualizationMode};
pub use progress::{
    CompletionReport, Coordinates, DetectedEntityRecord, ProgressSnapshot, ProgressUpdate,
    SessionSummary,
};
