use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use dashcore::protocol::{Coordinates, DetectedEntityRecord, ProgressSnapshot, ProgressUpdate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const OPERATIONS: [&str; 3] = ["scanning cells", "correlating signals", "locating entities"];

/// Replayed session: one progress event per step, then `complete` (or `error`
/// when `fail_with` is set).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScenarioScript {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default)]
    pub total_monitored: u64,
    #[serde(default)]
    pub fail_with: Option<String>,
    pub steps: Vec<ProgressUpdate>,
}

fn default_tick_ms() -> u64 {
    1000
}

impl ScenarioScript {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading scenario {}", path_ref.display()))?;
        let script: ScenarioScript = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing scenario {}", path_ref.display()))?;
        anyhow::ensure!(
            !script.steps.is_empty(),
            "scenario {} has no steps",
            path_ref.display()
        );
        Ok(script)
    }

    /// Evenly paced scenario that detects one entity per step.
    pub fn linear(steps: usize, tick_ms: u64) -> Self {
        let steps = steps.max(1);
        let origin = Utc::now();
        let mut detected = Vec::new();
        let updates = (1..=steps)
            .map(|step| {
                let record = DetectedEntityRecord {
                    identifier: format!("entity-{step:03}"),
                    coordinates: Coordinates {
                        lat: 40.4168 + step as f64 * 0.0031,
                        lon: -3.7038 - step as f64 * 0.0047,
                    },
                    approximate_distance_km: 0.35 * step as f64,
                    observed_at: origin + ChronoDuration::milliseconds((step as u64 * tick_ms) as i64),
                };
                detected.push(record.clone());
                let snapshot = ProgressSnapshot {
                    progress_percent: step as f64 * 100.0 / steps as f64,
                    current_operation_label: OPERATIONS[(step - 1) % OPERATIONS.len()].to_string(),
                    detected_entity_count: detected.len() as u64,
                    location_count: detected.len().div_ceil(2) as u64,
                    packets_analyzed: step as u64 * 250,
                    unique_cell_count: 1 + step as u64 / 3,
                };
                ProgressUpdate::new(snapshot).with_records(vec![record])
            })
            .collect();

        Self {
            tick_ms,
            total_monitored: steps as u64 * 4,
            fail_with: None,
            steps: updates,
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn linear_scenario_ends_at_full_progress() {
        let script = ScenarioScript::linear(4, 10);
        assert_eq!(script.steps.len(), 4);
        let last = &script.steps[3].snapshot;
        assert_eq!(last.progress_percent, 100.0);
        assert_eq!(last.detected_entity_count, 4);
        assert!(script.steps.iter().all(|step| step.records.len() == 1));
    }

    #[test]
    fn load_reads_backend_field_names() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"tick_ms: 50\nfail_with: capture device lost\nsteps:\n  - progress: 50\n    current_operation: scanning\n    detected_entities: 2\n    locations: 1\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let script = ScenarioScript::load(&path).unwrap();
        assert_eq!(script.tick(), Duration::from_millis(50));
        assert_eq!(script.fail_with.as_deref(), Some("capture device lost"));
        assert_eq!(script.steps[0].snapshot.detected_entity_count, 2);
        assert_eq!(script.steps[0].snapshot.packets_analyzed, 0);
    }

    #[test]
    fn load_rejects_an_empty_scenario() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"steps: []\n").unwrap();
        let path = temp.into_temp_path();
        assert!(ScenarioScript::load(&path).is_err());
    }
}
