use log::{info, warn};

use crate::session::SessionState;

/// Diagnostic entries for protocol desynchronisation. These never reach the user.
pub struct DiagnosticLog;

impl DiagnosticLog {
    pub fn new() -> Self {
        Self
    }

    pub fn discarded(&self, event: &str, state: SessionState) {
        warn!("discarding {} received while session is {}", event, state);
    }

    pub fn transition(&self, from: SessionState, to: SessionState) {
        info!("session {} -> {}", from, to);
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}
