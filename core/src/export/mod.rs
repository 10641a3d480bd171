pub mod coordinator;
pub mod saver;

use chrono::{DateTime, Utc};

use crate::protocol::ExportFormat;

pub use coordinator::ExportCoordinator;
pub use saver::{ArtifactSaver, DirectorySaver};

/// Export payload as received from the backend. Never retained after saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub payload_bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        format!(
            "monitor_export_{}.{}",
            at.format("%Y%m%d_%H%M%S"),
            self.format.as_str()
        )
    }
}
