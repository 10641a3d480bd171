use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

/// Aggregate counters for one server tick. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProgressSnapshot {
    #[serde(rename = "progress")]
    pub progress_percent: f64,
    #[serde(rename = "current_operation", default)]
    pub current_operation_label: String,
    #[serde(rename = "detected_entities", alias = "detected_imsis", default)]
    pub detected_entity_count: u64,
    #[serde(rename = "locations", default)]
    pub location_count: u64,
    #[serde(default)]
    pub packets_analyzed: u64,
    #[serde(rename = "unique_cells", default)]
    pub unique_cell_count: u64,
}

impl ProgressSnapshot {
    /// Progress clamped to `0..=100`; non-finite values read as zero.
    pub fn clamped_progress(&self) -> f64 {
        if self.progress_percent.is_finite() {
            self.progress_percent.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEntityRecord {
    pub identifier: String,
    pub coordinates: Coordinates,
    #[serde(rename = "distance_km")]
    pub approximate_distance_km: f64,
    pub observed_at: DateTime<Utc>,
}

/// Payload of a `progress` event: the new snapshot plus any records observed since the last tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProgressUpdate {
    #[serde(flatten)]
    pub snapshot: ProgressSnapshot,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<DetectedEntityRecord>,
}

impl ProgressUpdate {
    pub fn new(snapshot: ProgressSnapshot) -> Self {
        Self {
            snapshot,
            records: Vec::new(),
        }
    }

    pub fn with_records(mut self, records: Vec<DetectedEntityRecord>) -> Self {
        self.records = records;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionSummary {
    #[serde(default)]
    pub total_monitored: u64,
    #[serde(default)]
    pub total_detected: u64,
    #[serde(default)]
    pub total_locations: u64,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339 or an offset-less ISO 8601 timestamp (read as UTC).
/// Anything else becomes `None` so a bad timestamp never loses the summary.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<serde_json::Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let parsed = raw.as_str().and_then(parse_timestamp);
    if parsed.is_none() {
        warn!("ignoring unreadable summary timestamp {}", raw);
    }
    Ok(parsed)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Some(stamp.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Payload of a `complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CompletionReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ProgressSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<DetectedEntityRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_update_reads_backend_field_names() {
        let update: ProgressUpdate = serde_json::from_str(
            r#"{"progress": 12.5, "current_operation": "scanning",
                "detected_entities": 4, "locations": 2}"#,
        )
        .unwrap();
        assert_eq!(update.snapshot.progress_percent, 12.5);
        assert_eq!(update.snapshot.current_operation_label, "scanning");
        assert_eq!(update.snapshot.detected_entity_count, 4);
        assert_eq!(update.snapshot.packets_analyzed, 0);
        assert_eq!(update.snapshot.unique_cell_count, 0);
        assert!(update.records.is_empty());
    }

    #[test]
    fn progress_update_accepts_the_legacy_entity_count_name() {
        let update: ProgressUpdate =
            serde_json::from_str(r#"{"progress": 50, "detected_imsis": 6}"#).unwrap();
        assert_eq!(update.snapshot.detected_entity_count, 6);
    }

    #[test]
    fn progress_update_carries_explicit_records() {
        let update: ProgressUpdate = serde_json::from_str(
            r#"{"progress": 40, "records": [{"identifier": "entity-7",
                "coordinates": {"lat": 19.43, "lon": -99.13}, "distance_km": 1.5,
                "observed_at": "2024-05-01T10:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(update.records.len(), 1);
        assert_eq!(update.records[0].identifier, "entity-7");
        assert_eq!(update.records[0].approximate_distance_km, 1.5);
    }

    #[test]
    fn summary_accepts_timestamps_without_an_offset() {
        let summary: SessionSummary = serde_json::from_str(
            r#"{"total_detected": 3, "start_time": "2024-05-01T10:00:00.123456",
                "end_time": "2024-05-01T10:01:00+02:00"}"#,
        )
        .unwrap();
        let start = summary.start_time.unwrap();
        assert_eq!(start.to_rfc3339(), "2024-05-01T10:00:00.123456+00:00");
        assert_eq!(
            summary.end_time.unwrap().to_rfc3339(),
            "2024-05-01T08:01:00+00:00"
        );
    }

    #[test]
    fn unreadable_summary_timestamps_are_dropped() {
        let summary: SessionSummary = serde_json::from_str(
            r#"{"total_detected": 3, "start_time": "yesterday", "end_time": 1714557600}"#,
        )
        .unwrap();
        assert_eq!(summary.total_detected, 3);
        assert_eq!(summary.start_time, None);
        assert_eq!(summary.end_time, None);
    }

    #[test]
    fn clamped_progress_stays_in_range() {
        let snapshot = ProgressSnapshot {
            progress_percent: 140.0,
            ..Default::default()
        };
        assert_eq!(snapshot.clamped_progress(), 100.0);
        let snapshot = ProgressSnapshot {
            progress_percent: f64::NAN,
            ..Default::default()
        };
        assert_eq!(snapshot.clamped_progress(), 0.0);
    }
}
