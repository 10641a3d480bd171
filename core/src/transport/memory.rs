//! In-process transport. The [`MemoryBackend`] half plays the monitoring
//! backend: it receives every command and pushes events synchronously into
//! the subscriber's queue.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{Command, PushEvent, RawResponse, StatusReply};
use crate::transport::{PushSender, Subscription, Transport, TransportError};

pub fn pair() -> (MemoryTransport, MemoryBackend) {
    let (commands, incoming) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared::default());
    (
        MemoryTransport {
            commands,
            shared: shared.clone(),
        },
        MemoryBackend { incoming, shared },
    )
}

#[derive(Default)]
struct Shared {
    subscribers: Mutex<Vec<PushSender>>,
    sent: Mutex<Vec<Command>>,
}

#[derive(Clone)]
pub struct MemoryTransport {
    commands: mpsc::UnboundedSender<IncomingCommand>,
    shared: Arc<Shared>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_command(&self, command: &Command) -> Result<RawResponse, TransportError> {
        if let Ok(mut sent) = self.shared.sent.lock() {
            sent.push(command.clone());
        }
        let (responder, response) = oneshot::channel();
        self.commands
            .send(IncomingCommand {
                command: command.clone(),
                responder,
            })
            .map_err(|_| TransportError::Closed)?;
        response.await.map_err(|_| TransportError::Closed)?
    }

    fn subscribe(&self, events: PushSender) -> Subscription {
        if let Ok(mut subscribers) = self.shared.subscribers.lock() {
            subscribers.push(events);
        }
        Subscription::detached()
    }
}

/// A command waiting for the backend's answer. Dropping it fails the command with `Closed`.
#[derive(Debug)]
pub struct IncomingCommand {
    pub command: Command,
    responder: oneshot::Sender<Result<RawResponse, TransportError>>,
}

impl IncomingCommand {
    pub fn respond(self, response: RawResponse) {
        let _ = self.responder.send(Ok(response));
    }

    pub fn fail(self, error: TransportError) {
        let _ = self.responder.send(Err(error));
    }

    pub fn accept(self) {
        self.respond(RawResponse::reply(200, &StatusReply::success("ok")));
    }

    pub fn reject(self, message: &str) {
        self.respond(RawResponse::reply(200, &StatusReply::error(message)));
    }
}

pub struct MemoryBackend {
    incoming: mpsc::UnboundedReceiver<IncomingCommand>,
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub async fn next_command(&mut self) -> Option<IncomingCommand> {
        self.incoming.recv().await
    }

    pub fn try_next_command(&mut self) -> Option<IncomingCommand> {
        self.incoming.try_recv().ok()
    }

    /// Delivers `event` to every live subscriber and returns how many received it.
    pub fn push(&self, event: PushEvent) -> usize {
        match self.shared.subscribers.lock() {
            Ok(mut subscribers) => {
                subscribers.retain(|subscriber| subscriber.send(event.clone()));
                subscribers.len()
            }
            Err(_) => 0,
        }
    }

    /// Every command sent so far, in order.
    pub fn sent_commands(&self) -> Vec<Command> {
        self.shared
            .sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}
