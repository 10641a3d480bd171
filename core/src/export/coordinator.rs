use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::export::{ArtifactSaver, ExportArtifact};
use crate::prelude::{ControlError, ControlResult};
use crate::presentation::{Notification, PresentationSink};
use crate::protocol::{Command, ExportFormat, RawResponse, StatusReply};
use crate::transport::{send_with_timeout, Transport};

/// Requests exports and hands them to the saver. Independent of session state.
pub struct ExportCoordinator {
    transport: Arc<dyn Transport>,
    saver: Arc<dyn ArtifactSaver>,
    sink: Arc<dyn PresentationSink>,
    timeout: Option<Duration>,
}

impl ExportCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        saver: Arc<dyn ArtifactSaver>,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        Self {
            transport,
            saver,
            sink,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetches, saves and reports one export. Returns where the artifact was written.
    pub async fn request_export(&self, format: ExportFormat) -> ControlResult<PathBuf> {
        let result = self.fetch_and_save(format).await;
        match &result {
            Ok(path) => {
                info!("{} export saved to {}", format.label(), path.display());
                self.sink.notify(Notification::success(format!(
                    "Data exported as {}",
                    format.label()
                )));
            }
            Err(err) => {
                warn!("{} export failed: {}", format.label(), err);
                self.sink.notify(Notification::error(err.to_string()));
            }
        }
        result
    }

    async fn fetch_and_save(&self, format: ExportFormat) -> ControlResult<PathBuf> {
        let response = send_with_timeout(
            self.transport.as_ref(),
            &Command::Export(format),
            self.timeout,
        )
        .await
        .map_err(|err| ControlError::ExportFailure(format!("connection error while exporting: {err}")))?;

        let artifact = artifact_from_response(format, response)?;
        self.saver.save(&artifact).map_err(|err| {
            ControlError::ExportFailure(format!("could not save {} export: {err}", format.label()))
        })
    }
}

/// Accepts a response as an artifact only if it is a success and not an
/// error object sent with a success status.
pub(crate) fn artifact_from_response(
    format: ExportFormat,
    response: RawResponse,
) -> ControlResult<ExportArtifact> {
    if !response.is_success() {
        let message = response.failure_message().unwrap_or_else(|| {
            format!("export request failed with status {}", response.status)
        });
        return Err(ControlError::ExportFailure(message));
    }
    if let Some(reply) = StatusReply::parse(&response.body) {
        if !reply.is_success() {
            return Err(ControlError::ExportFailure(
                reply
                    .message
                    .unwrap_or_else(|| "backend reported an export error".into()),
            ));
        }
    }
    Ok(ExportArtifact {
        format,
        payload_bytes: response.body,
    })
}
