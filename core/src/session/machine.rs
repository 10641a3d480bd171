use chrono::Utc;

use crate::prelude::{ControlError, ControlResult};
use crate::protocol::{CompletionReport, MonitoringParameters, ProgressUpdate};
use crate::session::state::{Session, SessionState};
use crate::store::AggregationStore;

/// Tags one start or stop round trip so late acknowledgments can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: AttemptId,
    kind: PendingKind,
}

/// What feeding an acknowledgment or push event into the machine did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Transitioned {
        from: SessionState,
        to: SessionState,
    },
    /// Accepted without changing state.
    Applied,
    /// Not valid in the current state; nothing was changed.
    Discarded {
        state: SessionState,
        event: &'static str,
    },
}

/// Synchronous session lifecycle. Owns the aggregation store so every
/// mutation of either goes through the same validation.
#[derive(Debug)]
pub struct SessionMachine {
    session: Session,
    store: AggregationStore,
    pending: Option<Pending>,
    next_attempt: u64,
}

impl SessionMachine {
    pub fn new(store: AggregationStore) -> Self {
        Self {
            session: Session::default(),
            store,
            pending: None,
            next_attempt: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &AggregationStore {
        &self.store
    }

    pub fn pending_attempt(&self) -> Option<AttemptId> {
        self.pending.map(|pending| pending.id)
    }

    pub fn begin_start(&mut self, parameters: MonitoringParameters) -> ControlResult<AttemptId> {
        if !self.session.state.is_resting() {
            return Err(self.invalid("start"));
        }
        parameters.validate()?;

        self.session.parameters = Some(parameters);
        self.session.started_at = None;
        self.session.last_error = None;
        self.session.state = SessionState::Starting;
        Ok(self.open_attempt(PendingKind::Start))
    }

    pub fn begin_stop(&mut self) -> ControlResult<AttemptId> {
        if self.session.state != SessionState::Running {
            return Err(self.invalid("stop"));
        }
        self.session.state = SessionState::Stopping;
        Ok(self.open_attempt(PendingKind::Stop))
    }

    /// Resolves a start or stop round trip.
    ///
    /// A rejected stop leaves the session running; any other failure moves it
    /// to `Errored`. Acknowledgments for an attempt that is no longer pending
    /// are discarded.
    pub fn acknowledge(&mut self, attempt: AttemptId, result: &ControlResult<()>) -> Outcome {
        let pending = match self.pending {
            Some(pending) if pending.id == attempt => pending,
            _ => {
                return Outcome::Discarded {
                    state: self.session.state,
                    event: "acknowledgment",
                }
            }
        };
        self.pending = None;

        let from = self.session.state;
        match (pending.kind, result) {
            (PendingKind::Start, Ok(())) => {
                self.store.reset();
                self.session.started_at = Some(Utc::now());
                self.session.state = SessionState::Running;
            }
            (PendingKind::Stop, Ok(())) => {
                self.session.started_at = None;
                self.session.state = SessionState::Idle;
            }
            (PendingKind::Stop, Err(ControlError::BackendRejection(_))) => {
                self.session.state = SessionState::Running;
            }
            (_, Err(err)) => self.fail(err.to_string()),
        }
        Outcome::Transitioned {
            from,
            to: self.session.state,
        }
    }

    pub fn on_progress(&mut self, update: ProgressUpdate) -> Outcome {
        if self.session.state != SessionState::Running {
            return Outcome::Discarded {
                state: self.session.state,
                event: "progress",
            };
        }
        self.store.apply(update);
        Outcome::Applied
    }

    pub fn on_complete(&mut self, report: CompletionReport) -> Outcome {
        let from = self.session.state;
        if !matches!(from, SessionState::Running | SessionState::Stopping) {
            return Outcome::Discarded {
                state: from,
                event: "complete",
            };
        }
        self.pending = None;
        self.store.apply_completion(report);
        self.session.state = SessionState::Completed;
        Outcome::Transitioned {
            from,
            to: SessionState::Completed,
        }
    }

    /// Backend-reported failure. Preempts any pending start or stop.
    pub fn on_error(&mut self, message: impl Into<String>) -> Outcome {
        let from = self.session.state;
        if from.is_resting() {
            return Outcome::Discarded {
                state: from,
                event: "error",
            };
        }
        self.pending = None;
        self.fail(message.into());
        Outcome::Transitioned {
            from,
            to: SessionState::Errored,
        }
    }

    /// Returns a finished session to `Idle`. Collected data stays visible
    /// until the next session is accepted.
    pub fn reset(&mut self) -> ControlResult<()> {
        if !self.session.state.is_resting() {
            return Err(self.invalid("reset"));
        }
        self.session = Session::default();
        Ok(())
    }

    fn open_attempt(&mut self, kind: PendingKind) -> AttemptId {
        self.next_attempt += 1;
        let id = AttemptId(self.next_attempt);
        self.pending = Some(Pending { id, kind });
        id
    }

    fn fail(&mut self, message: String) {
        self.session.last_error = Some(message);
        self.session.state = SessionState::Errored;
    }

    fn invalid(&self, attempted: &'static str) -> ControlError {
        ControlError::InvalidStateTransition {
            state: self.session.state,
            attempted,
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(AggregationStore::default())
    }
}
