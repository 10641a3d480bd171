use std::collections::VecDeque;

use crate::protocol::{
    CompletionReport, DetectedEntityRecord, ProgressSnapshot, ProgressUpdate, SessionSummary,
};

/// Records kept per session unless configured otherwise.
pub const DEFAULT_RETENTION: usize = 1000;

/// Counters and detected-entity records for the current session.
///
/// Snapshots are swapped whole so the renderer never sees fields from two
/// different server ticks. Records are kept most-recent-first; once
/// `retention` is reached the oldest record is dropped. A retention of zero
/// keeps every record.
#[derive(Debug, Clone)]
pub struct AggregationStore {
    current: ProgressSnapshot,
    records: VecDeque<DetectedEntityRecord>,
    summary: Option<SessionSummary>,
    retention: usize,
}

impl AggregationStore {
    pub fn new(retention: usize) -> Self {
        Self {
            current: ProgressSnapshot::default(),
            records: VecDeque::new(),
            summary: None,
            retention,
        }
    }

    pub fn reset(&mut self) {
        self.current = ProgressSnapshot::default();
        self.records.clear();
        self.summary = None;
    }

    pub fn apply(&mut self, update: ProgressUpdate) {
        self.current = update.snapshot;
        self.append(update.records);
    }

    /// Final update of a session. Absent fields leave the previous values in place.
    pub fn apply_completion(&mut self, report: CompletionReport) {
        if let Some(snapshot) = report.snapshot {
            self.current = snapshot;
        }
        if report.summary.is_some() {
            self.summary = report.summary;
        }
        self.append(report.records);
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.current
    }

    /// Records, most recent first.
    pub fn records(&self) -> impl Iterator<Item = &DetectedEntityRecord> {
        self.records.iter()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    fn append(&mut self, records: Vec<DetectedEntityRecord>) {
        for record in records {
            self.records.push_front(record);
        }
        if self.retention > 0 {
            self.records.truncate(self.retention);
        }
    }
}

impl Default for AggregationStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Coordinates;
    use chrono::{TimeZone, Utc};

    fn record(identifier: &str, minute: u32) -> DetectedEntityRecord {
        DetectedEntityRecord {
            identifier: identifier.into(),
            coordinates: Coordinates {
                lat: 19.4,
                lon: -99.1,
            },
            approximate_distance_km: 0.8,
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
        }
    }

    #[test]
    fn apply_replaces_the_whole_snapshot() {
        let mut store = AggregationStore::default();
        store.apply(ProgressUpdate::new(ProgressSnapshot {
            progress_percent: 10.0,
            current_operation_label: "capturing".into(),
            packets_analyzed: 500,
            ..Default::default()
        }));
        let second = ProgressSnapshot {
            progress_percent: 20.0,
            detected_entity_count: 4,
            unique_cell_count: 7,
            ..Default::default()
        };
        store.apply(ProgressUpdate::new(second.clone()));

        assert_eq!(store.snapshot(), &second);
        assert_eq!(store.snapshot().packets_analyzed, 0);
        assert!(store.snapshot().current_operation_label.is_empty());
    }

    #[test]
    fn records_are_listed_most_recent_first() {
        let mut store = AggregationStore::default();
        store.apply(ProgressUpdate::default().with_records(vec![record("a", 1)]));
        store.apply(ProgressUpdate::default().with_records(vec![record("b", 2), record("c", 3)]));

        let order: Vec<_> = store.records().map(|r| r.identifier.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn retention_drops_the_oldest_records() {
        let mut store = AggregationStore::new(2);
        store.apply(
            ProgressUpdate::default().with_records(vec![record("a", 1), record("b", 2), record("c", 3)]),
        );
        let kept: Vec<_> = store.records().map(|r| r.identifier.as_str()).collect();
        assert_eq!(kept, vec!["c", "b"]);
    }

    #[test]
    fn zero_retention_keeps_everything() {
        let mut store = AggregationStore::new(0);
        let records = (0..1500).map(|i| record(&format!("e{i}"), 0)).collect();
        store.apply(ProgressUpdate::default().with_records(records));
        assert_eq!(store.record_count(), 1500);
    }

    #[test]
    fn completion_without_snapshot_keeps_last_counters() {
        let mut store = AggregationStore::default();
        let last = ProgressSnapshot {
            progress_percent: 90.0,
            location_count: 3,
            ..Default::default()
        };
        store.apply(ProgressUpdate::new(last.clone()));
        store.apply_completion(CompletionReport {
            summary: Some(SessionSummary {
                total_detected: 3,
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(store.snapshot(), &last);
        assert_eq!(store.summary().map(|s| s.total_detected), Some(3));
    }

    #[test]
    fn reset_clears_counters_records_and_summary() {
        let mut store = AggregationStore::default();
        store.apply_completion(CompletionReport {
            snapshot: Some(ProgressSnapshot {
                progress_percent: 100.0,
                ..Default::default()
            }),
            summary: Some(SessionSummary::default()),
            records: vec![record("a", 1)],
        });
        store.reset();
        assert_eq!(store.snapshot(), &ProgressSnapshot::default());
        assert_eq!(store.record_count(), 0);
        assert!(store.summary().is_none());
    }
}
