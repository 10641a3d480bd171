use anyhow::Context;
use dashcore::export::DirectorySaver;
use dashcore::presentation::{DashboardView, LogSink};
use dashcore::protocol::{ExportFormat, MonitoringParameters};
use dashcore::transport::HttpTransport;
use dashcore::{ClientConfig, Controller, ControllerHandle, SessionState};
use log::{info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

const POLL: Duration = Duration::from_millis(500);

/// Runs one session against the configured backend, logging everything.
pub async fn run(
    config: &ClientConfig,
    parameters: MonitoringParameters,
    export: Option<ExportFormat>,
) -> anyhow::Result<()> {
    let handle = Controller::spawn(
        Arc::new(HttpTransport::from_config(config)),
        Arc::new(LogSink::new()),
        Arc::new(DirectorySaver::new(&config.export_dir)),
        config,
    );
    let interrupt = || async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("awaiting Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };
    let result = drive(&handle, parameters, export, POLL, interrupt).await;
    handle.shutdown();
    result
}

/// `interrupt` is called once per wait: the first interrupt stops the session,
/// a second one abandons it.
async fn drive<I, F>(
    handle: &ControllerHandle,
    parameters: MonitoringParameters,
    export: Option<ExportFormat>,
    poll: Duration,
    interrupt: I,
) -> anyhow::Result<()>
where
    I: Fn() -> F,
    F: Future<Output = ()>,
{
    handle
        .request_start(parameters)
        .await
        .context("starting monitoring session")?;

    let view = tokio::select! {
        view = wait_until_resting(handle, poll) => view?,
        _ = interrupt() => {
            warn!("interrupted, stopping the session (interrupt again to give up)");
            if let Err(err) = handle.request_stop().await {
                warn!("stop request failed: {}", err);
            }
            tokio::select! {
                view = wait_until_resting(handle, poll) => view?,
                _ = interrupt() => anyhow::bail!("interrupted again, abandoning the session"),
            }
        }
    };
    info!(
        "session ended {}: {} entities, {} locations, {} records",
        view.state,
        view.snapshot.detected_entity_count,
        view.snapshot.location_count,
        view.records.len()
    );

    if view.state == SessionState::Errored {
        anyhow::bail!(
            "session failed: {}",
            view.last_error.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(format) = export {
        let path = handle
            .request_export(format)
            .await
            .with_context(|| format!("exporting {}", format.label()))?;
        info!("export written to {}", path.display());
    }
    Ok(())
}

async fn wait_until_resting(
    handle: &ControllerHandle,
    poll: Duration,
) -> anyhow::Result<DashboardView> {
    let mut ticker = tokio::time::interval(poll);
    loop {
        ticker.tick().await;
        let view = handle.view().await?;
        if view.state.is_resting() {
            return Ok(view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashcore::protocol::{CompletionReport, PushEvent, RawResponse, VisualizationMode};
    use dashcore::transport::memory;
    use tokio::sync::Notify;

    fn params() -> MonitoringParameters {
        MonitoringParameters::new("X", "", 60, VisualizationMode::Table)
    }

    async fn wait_for_running(handle: &ControllerHandle) {
        while handle.view().await.unwrap().state != SessionState::Running {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn completed_session_is_exported() {
        let (transport, mut backend) = memory::pair();
        let exports = tempfile::tempdir().unwrap();
        let handle = Controller::spawn(
            Arc::new(transport),
            Arc::new(LogSink::new()),
            Arc::new(DirectorySaver::new(exports.path())),
            &ClientConfig::default(),
        );

        let driver = tokio::spawn({
            let handle = handle.clone();
            async move {
                drive(
                    &handle,
                    params(),
                    Some(ExportFormat::Json),
                    Duration::from_millis(5),
                    std::future::pending::<()>,
                )
                .await
            }
        });

        backend.next_command().await.unwrap().accept();
        wait_for_running(&handle).await;
        backend.push(PushEvent::Complete(CompletionReport::default()));
        backend
            .next_command()
            .await
            .unwrap()
            .respond(RawResponse::new(200, br#"{"records":[]}"#.to_vec()));

        driver.await.unwrap().unwrap();
        assert_eq!(std::fs::read_dir(exports.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn failed_session_is_an_error() {
        let (transport, mut backend) = memory::pair();
        let exports = tempfile::tempdir().unwrap();
        let handle = Controller::spawn(
            Arc::new(transport),
            Arc::new(LogSink::new()),
            Arc::new(DirectorySaver::new(exports.path())),
            &ClientConfig::default(),
        );

        let driver = tokio::spawn({
            let handle = handle.clone();
            async move {
                drive(
                    &handle,
                    params(),
                    None,
                    Duration::from_millis(5),
                    std::future::pending::<()>,
                )
                .await
            }
        });

        backend.next_command().await.unwrap().accept();
        wait_for_running(&handle).await;
        backend.push(PushEvent::Error {
            message: "link down".into(),
        });

        let err = driver.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("link down"));
    }

    #[tokio::test]
    async fn second_interrupt_abandons_a_session_whose_stop_was_refused() {
        let (transport, mut backend) = memory::pair();
        let exports = tempfile::tempdir().unwrap();
        let handle = Controller::spawn(
            Arc::new(transport),
            Arc::new(LogSink::new()),
            Arc::new(DirectorySaver::new(exports.path())),
            &ClientConfig::default(),
        );
        let interrupts = Arc::new(Notify::new());

        let driver = tokio::spawn({
            let handle = handle.clone();
            let interrupts = interrupts.clone();
            async move {
                let interrupt = || {
                    let interrupts = interrupts.clone();
                    async move { interrupts.notified().await }
                };
                drive(&handle, params(), None, Duration::from_millis(5), interrupt).await
            }
        });

        backend.next_command().await.unwrap().accept();
        wait_for_running(&handle).await;
        interrupts.notify_one();
        backend
            .next_command()
            .await
            .unwrap()
            .reject("stop refused by backend");
        interrupts.notify_one();

        let err = driver.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("interrupted again"));
        assert_eq!(handle.view().await.unwrap().state, SessionState::Running);
    }
}
