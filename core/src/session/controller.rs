use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::config::ClientConfig;
use crate::export::{ArtifactSaver, ExportCoordinator};
use crate::prelude::{ControlError, ControlResult};
use crate::presentation::{Connectivity, DashboardView, Notification, PresentationSink};
use crate::protocol::{Command, ExportFormat, MonitoringParameters, PushEvent, RawResponse, StatusReply};
use crate::session::machine::{AttemptId, Outcome, SessionMachine};
use crate::session::state::SessionState;
use crate::store::AggregationStore;
use crate::telemetry::{DiagnosticLog, EventCounters};
use crate::transport::{send_with_timeout, PushSender, Subscription, Transport, TransportError};

type Reply<T> = oneshot::Sender<ControlResult<T>>;

/// Everything the controller reacts to, processed strictly in arrival order.
#[derive(Debug)]
enum Inbound {
    Start {
        parameters: MonitoringParameters,
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Reset {
        reply: Reply<()>,
    },
    Export {
        format: ExportFormat,
        reply: Reply<PathBuf>,
    },
    View {
        reply: oneshot::Sender<DashboardView>,
    },
    Push(PushEvent),
    Acknowledged {
        attempt: AttemptId,
        result: ControlResult<()>,
    },
    Shutdown,
}

/// Event loop that owns the session machine.
///
/// User requests, push events and command acknowledgments all arrive on one
/// queue and are handled one at a time, so the session and its store are never
/// mutated concurrently. Command round trips run in their own tasks and
/// report back through the same queue.
pub struct Controller {
    machine: SessionMachine,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn PresentationSink>,
    exporter: Arc<ExportCoordinator>,
    command_timeout: Option<Duration>,
    acks: mpsc::WeakUnboundedSender<Inbound>,
    pending_reply: Option<(AttemptId, Reply<()>)>,
    connectivity: Connectivity,
    counters: EventCounters,
    diagnostics: DiagnosticLog,
    _subscription: Subscription,
}

impl Controller {
    /// Subscribes to the transport and starts the event loop. Must be called
    /// from within a tokio runtime. The loop ends once every handle is dropped
    /// or [`ControllerHandle::shutdown`] is called.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn PresentationSink>,
        saver: Arc<dyn ArtifactSaver>,
        config: &ClientConfig,
    ) -> ControllerHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        let push = tx.downgrade();
        let subscription = transport.subscribe(PushSender::new(move |event| {
            push.upgrade()
                .map_or(false, |tx| tx.send(Inbound::Push(event)).is_ok())
        }));

        let exporter = ExportCoordinator::new(transport.clone(), saver, sink.clone())
            .with_timeout(config.command_timeout());

        let controller = Controller {
            machine: SessionMachine::new(AggregationStore::new(config.retention_limit)),
            transport,
            sink,
            exporter: Arc::new(exporter),
            command_timeout: config.command_timeout(),
            acks: tx.downgrade(),
            pending_reply: None,
            connectivity: Connectivity::Unknown,
            counters: EventCounters::new(),
            diagnostics: DiagnosticLog::new(),
            _subscription: subscription,
        };
        tokio::spawn(controller.run(rx));

        ControllerHandle { tx }
    }

    async fn run(mut self, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
        info!("session controller started");
        self.publish();

        while let Some(message) = inbound.recv().await {
            if let Inbound::Shutdown = message {
                break;
            }
            self.handle(message);
        }

        if let Some((_, reply)) = self.pending_reply.take() {
            let _ = reply.send(Err(ControlError::ControllerClosed));
        }
        info!("session controller stopped");
    }

    fn handle(&mut self, message: Inbound) {
        match message {
            Inbound::Start { parameters, reply } => self.start(parameters, reply),
            Inbound::Stop { reply } => self.stop(reply),
            Inbound::Reset { reply } => self.reset(reply),
            Inbound::Export { format, reply } => self.export(format, reply),
            Inbound::View { reply } => {
                let _ = reply.send(self.view());
            }
            Inbound::Push(event) => self.push(event),
            Inbound::Acknowledged { attempt, result } => self.acknowledged(attempt, result),
            Inbound::Shutdown => {}
        }
    }

    fn start(&mut self, parameters: MonitoringParameters, reply: Reply<()>) {
        match self.machine.begin_start(parameters.clone()) {
            Ok(attempt) => {
                info!(
                    "requesting monitoring of '{}' for {}s",
                    parameters.target_identifier, parameters.duration_seconds
                );
                self.pending_reply = Some((attempt, reply));
                self.publish();
                self.dispatch(attempt, Command::Start(parameters));
            }
            Err(err) => self.refuse(err, reply),
        }
    }

    fn stop(&mut self, reply: Reply<()>) {
        match self.machine.begin_stop() {
            Ok(attempt) => {
                info!("requesting stop");
                self.pending_reply = Some((attempt, reply));
                self.publish();
                self.dispatch(attempt, Command::Stop);
            }
            Err(err) => self.refuse(err, reply),
        }
    }

    fn reset(&mut self, reply: Reply<()>) {
        let from = self.machine.state();
        match self.machine.reset() {
            Ok(()) => {
                self.diagnostics.transition(from, SessionState::Idle);
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Err(err) => self.refuse(err, reply),
        }
    }

    fn export(&self, format: ExportFormat, reply: Reply<PathBuf>) {
        let exporter = self.exporter.clone();
        tokio::spawn(async move {
            let _ = reply.send(exporter.request_export(format).await);
        });
    }

    fn refuse(&self, err: ControlError, reply: Reply<()>) {
        debug!("request refused: {}", err);
        self.counters.record_failure();
        self.sink.notify(Notification::warning(err.to_string()));
        let _ = reply.send(Err(err));
    }

    fn dispatch(&self, attempt: AttemptId, command: Command) {
        let transport = self.transport.clone();
        let acks = self.acks.clone();
        let timeout = self.command_timeout;
        tokio::spawn(async move {
            let response = send_with_timeout(transport.as_ref(), &command, timeout).await;
            let result = interpret(command.name(), response);
            if let Some(tx) = acks.upgrade() {
                let _ = tx.send(Inbound::Acknowledged { attempt, result });
            }
        });
    }

    fn acknowledged(&mut self, attempt: AttemptId, result: ControlResult<()>) {
        match self.machine.acknowledge(attempt, &result) {
            Outcome::Transitioned { from, to } => {
                self.diagnostics.transition(from, to);
                let notification = match (&result, to) {
                    (Ok(()), SessionState::Running) => Notification::success("Monitoring started"),
                    (Ok(()), _) => Notification::warning("Monitoring stopped"),
                    (Err(err), _) => {
                        self.counters.record_failure();
                        Notification::error(err.to_string())
                    }
                };
                self.sink.notify(notification);
                self.resolve(attempt, result);
                self.publish();
            }
            outcome => self.ignore(outcome),
        }
    }

    fn push(&mut self, event: PushEvent) {
        match event {
            PushEvent::Connected => self.set_connectivity(Connectivity::Connected),
            PushEvent::Disconnected => self.set_connectivity(Connectivity::Disconnected),
            PushEvent::Progress(update) => match self.machine.on_progress(update) {
                Outcome::Applied => {
                    self.counters.record_applied();
                    self.publish();
                }
                outcome => self.ignore(outcome),
            },
            PushEvent::Complete(report) => match self.machine.on_complete(report) {
                Outcome::Transitioned { from, to } => {
                    self.counters.record_applied();
                    self.diagnostics.transition(from, to);
                    self.preempt(Ok(()));
                    self.sink.notify(Notification::success("Monitoring completed"));
                    self.publish();
                }
                outcome => self.ignore(outcome),
            },
            PushEvent::Error { message } => match self.machine.on_error(message.clone()) {
                Outcome::Transitioned { from, to } => {
                    self.counters.record_applied();
                    self.diagnostics.transition(from, to);
                    self.preempt(Err(ControlError::BackendRejection(message.clone())));
                    self.sink.notify(Notification::error(message));
                    self.publish();
                }
                outcome => self.ignore(outcome),
            },
        }
    }

    fn set_connectivity(&mut self, status: Connectivity) {
        if self.connectivity == status {
            return;
        }
        self.connectivity = status;
        match status {
            Connectivity::Disconnected => warn!("backend push channel disconnected"),
            _ => info!("backend push channel {}", status.label().to_lowercase()),
        }
        self.sink.connectivity(status);
        self.publish();
    }

    fn ignore(&self, outcome: Outcome) {
        if let Outcome::Discarded { state, event } = outcome {
            self.counters.record_discarded();
            self.diagnostics.discarded(event, state);
        }
    }

    fn resolve(&mut self, attempt: AttemptId, result: ControlResult<()>) {
        match self.pending_reply.take() {
            Some((pending, reply)) if pending == attempt => {
                let _ = reply.send(result);
            }
            other => self.pending_reply = other,
        }
    }

    /// Answers the request a terminal push event cut short.
    fn preempt(&mut self, result: ControlResult<()>) {
        if let Some((_, reply)) = self.pending_reply.take() {
            let _ = reply.send(result);
        }
    }

    fn view(&self) -> DashboardView {
        let session = self.machine.session();
        let store = self.machine.store();
        DashboardView {
            state: session.state(),
            parameters: session.parameters().cloned(),
            started_at: session.started_at(),
            last_error: session.last_error().map(str::to_string),
            snapshot: store.snapshot().clone(),
            records: store.records().cloned().collect(),
            summary: store.summary().cloned(),
            connectivity: self.connectivity,
            counters: self.counters.snapshot(),
        }
    }

    fn publish(&self) {
        self.sink.render(&self.view());
    }
}

/// Maps a start/stop round trip onto the error taxonomy.
fn interpret(command: &str, response: Result<RawResponse, TransportError>) -> ControlResult<()> {
    let response = response.map_err(|err| ControlError::ConnectivityFailure(err.to_string()))?;
    match StatusReply::parse(&response.body) {
        Some(reply) if reply.is_success() && response.is_success() => Ok(()),
        Some(reply) if !reply.is_success() => Err(ControlError::BackendRejection(
            reply
                .message
                .unwrap_or_else(|| format!("{command} command was refused")),
        )),
        _ => Err(ControlError::BackendRejection(format!(
            "unexpected {command} response (status {})",
            response.status
        ))),
    }
}

/// Cloneable front door to a running [`Controller`].
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl ControllerHandle {
    /// Resolves once the backend accepted or refused the session, or a push
    /// event ended the attempt first.
    pub async fn request_start(&self, parameters: MonitoringParameters) -> ControlResult<()> {
        self.call(|reply| Inbound::Start { parameters, reply }).await?
    }

    pub async fn request_stop(&self) -> ControlResult<()> {
        self.call(|reply| Inbound::Stop { reply }).await?
    }

    pub async fn reset(&self) -> ControlResult<()> {
        self.call(|reply| Inbound::Reset { reply }).await?
    }

    /// Allowed in any session state.
    pub async fn request_export(&self, format: ExportFormat) -> ControlResult<PathBuf> {
        self.call(|reply| Inbound::Export { format, reply }).await?
    }

    pub async fn view(&self) -> ControlResult<DashboardView> {
        self.call(|reply| Inbound::View { reply }).await
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Inbound::Shutdown);
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Inbound) -> ControlResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| ControlError::ControllerClosed)?;
        response.await.map_err(|_| ControlError::ControllerClosed)
    }
}
