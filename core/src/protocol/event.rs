use serde::{Deserialize, Serialize};

use crate::protocol::{CompletionReport, ProgressUpdate};

pub const PROGRESS_EVENT: &str = "progress";
pub const COMPLETE_EVENT: &str = "complete";
pub const ERROR_EVENT: &str = "error";

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorPayload {
    error: String,
}

/// Event delivered over the push channel, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Progress(ProgressUpdate),
    Complete(CompletionReport),
    Error { message: String },
    Connected,
    Disconnected,
}

impl PushEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PushEvent::Progress(_) => PROGRESS_EVENT,
            PushEvent::Complete(_) => COMPLETE_EVENT,
            PushEvent::Error { .. } => ERROR_EVENT,
            PushEvent::Connected => "connected",
            PushEvent::Disconnected => "disconnected",
        }
    }

    /// Decodes a named event. Returns `Ok(None)` for event types this client does not consume.
    pub fn decode(event_type: &str, data: &str) -> Result<Option<PushEvent>, DecodeError> {
        let event = match event_type {
            PROGRESS_EVENT => PushEvent::Progress(parse(PROGRESS_EVENT, data)?),
            COMPLETE_EVENT => PushEvent::Complete(parse(COMPLETE_EVENT, data)?),
            ERROR_EVENT => {
                let payload: ErrorPayload = parse(ERROR_EVENT, data)?;
                PushEvent::Error {
                    message: payload.error,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Event name and JSON body for the wire. Connectivity events are local and never encoded.
    pub fn encode(&self) -> Result<Option<(&'static str, String)>, serde_json::Error> {
        let data = match self {
            PushEvent::Progress(update) => serde_json::to_string(update)?,
            PushEvent::Complete(report) => serde_json::to_string(report)?,
            PushEvent::Error { message } => serde_json::to_string(&ErrorPayload {
                error: message.clone(),
            })?,
            PushEvent::Connected | PushEvent::Disconnected => return Ok(None),
        };
        Ok(Some((self.kind(), data)))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(kind: &'static str, data: &str) -> Result<T, DecodeError> {
    serde_json::from_str(data).map_err(|source| DecodeError::Malformed { kind, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProgressSnapshot;

    #[test]
    fn decodes_error_payload() {
        let event = PushEvent::decode("error", r#"{"error": "capture device lost"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            PushEvent::Error {
                message: "capture device lost".into()
            }
        );
    }

    #[test]
    fn unrelated_event_types_are_skipped() {
        assert!(PushEvent::decode("status_update", "{}").unwrap().is_none());
    }

    #[test]
    fn complete_with_naive_summary_timestamps_still_decodes() {
        let event = PushEvent::decode(
            "complete",
            r#"{"summary": {"total_monitored": 12, "total_detected": 3, "total_locations": 2,
                "success_rate": 25.0, "start_time": "2024-05-01T10:00:00.123456",
                "end_time": "2024-05-01T10:05:00.654321"}}"#,
        )
        .unwrap()
        .unwrap();
        let PushEvent::Complete(report) = event else {
            panic!("expected a complete event, got {:?}", event);
        };
        let summary = report.summary.unwrap();
        assert_eq!(summary.total_detected, 3);
        assert!(summary.start_time.unwrap() < summary.end_time.unwrap());
    }

    #[test]
    fn malformed_progress_is_reported() {
        let err = PushEvent::decode("progress", "{not json").unwrap_err();
        assert!(err.to_string().starts_with("malformed progress payload"));
    }

    #[test]
    fn encoded_progress_decodes_to_the_same_event() {
        let event = PushEvent::Progress(ProgressUpdate::new(ProgressSnapshot {
            progress_percent: 75.0,
            current_operation_label: "correlating".into(),
            detected_entity_count: 2,
            location_count: 1,
            packets_analyzed: 900,
            unique_cell_count: 3,
        }));
        let (name, data) = event.encode().unwrap().unwrap();
        assert_eq!(PushEvent::decode(name, &data).unwrap(), Some(event));
        assert!(PushEvent::Connected.encode().unwrap().is_none());
    }
}
