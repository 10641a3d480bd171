use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::store::DEFAULT_RETENTION;

/// Client-side settings shared by the transport, controller and exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub backend_url: String,
    /// Round-trip limit for commands. `None` waits indefinitely.
    pub command_timeout_ms: Option<u64>,
    /// Maximum number of detected-entity records kept per session; 0 keeps all.
    pub retention_limit: usize,
    pub export_dir: PathBuf,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".into(),
            command_timeout_ms: None,
            retention_limit: DEFAULT_RETENTION,
            export_dir: PathBuf::from("exports"),
            reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 60_000,
        }
    }
}

impl ClientConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms.max(1))
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms.max(self.reconnect_delay_ms).max(1))
    }
}
