use chrono::{DateTime, Utc};
use dashcore::protocol::{
    CompletionReport, DetectedEntityRecord, ExportFormat, MonitoringParameters, ProgressSnapshot,
    ProgressUpdate, PushEvent, SessionSummary, StatusReply,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};

use crate::runner;
use crate::scenario::ScenarioScript;

pub const MAX_RECORDS: usize = 1000;
pub const ALREADY_RUNNING: &str = "a monitoring session is already running";
pub const NO_ACTIVE_SESSION: &str = "no active monitoring session";
pub const NO_DATA: &str = "no data to export";

/// One line of the CSV export.
#[derive(Serialize)]
struct CsvRow<'a> {
    identifier: &'a str,
    observed_at: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    distance_km: f64,
}

impl<'a> From<&'a DetectedEntityRecord> for CsvRow<'a> {
    fn from(record: &'a DetectedEntityRecord) -> Self {
        Self {
            identifier: &record.identifier,
            observed_at: record.observed_at,
            latitude: record.coordinates.lat,
            longitude: record.coordinates.lon,
            distance_km: record.approximate_distance_km,
        }
    }
}

#[derive(Debug, Default)]
struct BackendState {
    /// Bumped on every start; runners of earlier sessions carry a stale value.
    generation: u64,
    active: bool,
    parameters: Option<MonitoringParameters>,
    started_at: Option<DateTime<Utc>>,
    snapshot: ProgressSnapshot,
    /// Most recent first.
    records: VecDeque<DetectedEntityRecord>,
    summary: Option<SessionSummary>,
    stop: Option<watch::Sender<bool>>,
}

/// Reference backend shared by the HTTP routes and the session task.
#[derive(Clone)]
pub struct Simulator {
    state: Arc<RwLock<BackendState>>,
    events: broadcast::Sender<PushEvent>,
    script: Arc<ScenarioScript>,
}

impl Simulator {
    pub fn new(script: ScenarioScript) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(BackendState::default())),
            events,
            script: Arc::new(script),
        }
    }

    pub fn script(&self) -> &ScenarioScript {
        &self.script
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }

    #[cfg(test)]
    pub async fn is_active(&self) -> bool {
        self.state.read().await.active
    }

    pub async fn start(&self, parameters: MonitoringParameters) -> StatusReply {
        let mut state = self.state.write().await;
        if state.active {
            return StatusReply::error(ALREADY_RUNNING);
        }
        let (stop, stopped) = watch::channel(false);
        let generation = state.generation + 1;
        *state = BackendState {
            generation,
            active: true,
            parameters: Some(parameters.clone()),
            started_at: Some(Utc::now()),
            stop: Some(stop),
            ..BackendState::default()
        };
        drop(state);

        info!(
            "monitoring '{}' (operator '{}') for {}s",
            parameters.target_identifier, parameters.operator_filter, parameters.duration_seconds
        );
        tokio::spawn(runner::run_session(self.clone(), generation, stopped));
        StatusReply::success("monitoring started")
    }

    pub async fn stop(&self) -> StatusReply {
        let mut state = self.state.write().await;
        if !state.active {
            return StatusReply::error(NO_ACTIVE_SESSION);
        }
        if let Some(stop) = state.stop.take() {
            let _ = stop.send(true);
        }
        state.active = false;
        state.snapshot.current_operation_label = "monitoring stopped".into();
        info!("monitoring stopped on request");
        StatusReply::success("monitoring stopped")
    }

    pub(crate) async fn record_progress(&self, generation: u64, update: ProgressUpdate) {
        {
            let mut state = self.state.write().await;
            if state.generation != generation {
                debug!("dropping progress from superseded session {}", generation);
                return;
            }
            state.snapshot = update.snapshot.clone();
            for record in &update.records {
                state.records.push_front(record.clone());
            }
            state.records.truncate(MAX_RECORDS);
        }
        self.publish(PushEvent::Progress(update));
    }

    pub(crate) async fn complete(&self, generation: u64) {
        let report = {
            let mut state = self.state.write().await;
            if state.generation != generation {
                debug!("superseded session {} finished", generation);
                return;
            }
            let detected = state.snapshot.detected_entity_count;
            let monitored = self.script.total_monitored;
            let summary = SessionSummary {
                total_monitored: monitored,
                total_detected: detected,
                total_locations: state.snapshot.location_count,
                success_rate: if monitored > 0 {
                    detected as f64 * 100.0 / monitored as f64
                } else {
                    0.0
                },
                start_time: state.started_at,
                end_time: Some(Utc::now()),
            };
            state.active = false;
            state.stop = None;
            state.summary = Some(summary.clone());
            if let Some(parameters) = &state.parameters {
                info!(
                    "monitoring of '{}' complete: {} detected",
                    parameters.target_identifier, detected
                );
            }
            CompletionReport {
                snapshot: Some(state.snapshot.clone()),
                summary: Some(summary),
                records: Vec::new(),
            }
        };
        self.publish(PushEvent::Complete(report));
    }

    pub(crate) async fn fail(&self, generation: u64, message: &str) {
        {
            let mut state = self.state.write().await;
            if state.generation != generation {
                debug!("superseded session {} failed: {}", generation, message);
                return;
            }
            state.active = false;
            state.stop = None;
        }
        warn!("monitoring failed: {}", message);
        self.publish(PushEvent::Error {
            message: message.to_string(),
        });
    }

    /// Body of the export, or `None` when nothing has been detected yet.
    pub async fn export(&self, format: ExportFormat) -> anyhow::Result<Option<Vec<u8>>> {
        let state = self.state.read().await;
        if state.records.is_empty() {
            return Ok(None);
        }
        let body = match format {
            ExportFormat::Json => {
                let report = CompletionReport {
                    snapshot: Some(state.snapshot.clone()),
                    summary: state.summary.clone(),
                    records: state.records.iter().cloned().collect(),
                };
                serde_json::to_vec_pretty(&report)?
            }
            ExportFormat::Csv => to_csv(state.records.iter())?,
        };
        Ok(Some(body))
    }

    fn publish(&self, event: PushEvent) {
        // Nobody listening is fine; the dashboard may connect later.
        let _ = self.events.send(event);
    }
}

fn to_csv<'a>(records: impl Iterator<Item = &'a DetectedEntityRecord>) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("flushing csv export: {}", err.error()))
}
