use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::prelude::{ControlError, ControlResult};

/// How the dashboard lays out detected entities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationMode {
    #[default]
    Map,
    Table,
}

impl VisualizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            VisualizationMode::Map => "map",
            VisualizationMode::Table => "table",
        }
    }
}

impl fmt::Display for VisualizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualizationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "map" => Ok(VisualizationMode::Map),
            "table" => Ok(VisualizationMode::Table),
            other => Err(format!("unknown visualization mode '{other}'")),
        }
    }
}

/// Parameters submitted with a start command. Frozen once the session leaves `Idle`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitoringParameters {
    #[serde(alias = "phone_number")]
    pub target_identifier: String,
    /// Empty means no operator restriction.
    #[serde(default, alias = "operator")]
    pub operator_filter: String,
    pub duration_seconds: u64,
    #[serde(default, alias = "visualization")]
    pub visualization_mode: VisualizationMode,
}

impl MonitoringParameters {
    pub fn new(
        target_identifier: impl Into<String>,
        operator_filter: impl Into<String>,
        duration_seconds: u64,
        visualization_mode: VisualizationMode,
    ) -> Self {
        Self {
            target_identifier: target_identifier.into(),
            operator_filter: operator_filter.into(),
            duration_seconds,
            visualization_mode,
        }
    }

    pub fn validate(&self) -> ControlResult<()> {
        if self.target_identifier.trim().is_empty() {
            return Err(ControlError::Validation(
                "target identifier must not be empty".into(),
            ));
        }
        if self.duration_seconds == 0 {
            return Err(ControlError::Validation(
                "duration must be at least one second".into(),
            ));
        }
        Ok(())
    }
}
