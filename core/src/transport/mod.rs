//! Seam between the controller and the monitoring backend.
//!
//! A transport offers one request/response channel for commands and one push
//! channel for events. Push events must be handed to the [`PushSender`] in the
//! order they were received; connectivity changes are reported on the same
//! channel as [`PushEvent::Connected`] and [`PushEvent::Disconnected`].

pub mod http;
pub mod memory;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::{Command, PushEvent, RawResponse};

pub use http::HttpTransport;
pub use memory::{MemoryBackend, MemoryTransport};

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("channel closed")]
    Closed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_command(&self, command: &Command) -> Result<RawResponse, TransportError>;

    /// Starts delivering push events. Delivery stops when the returned
    /// subscription is dropped or the sender reports the receiver is gone.
    fn subscribe(&self, events: PushSender) -> Subscription;
}

/// Sends a command, failing with [`TransportError::Timeout`] once `limit` elapses.
pub async fn send_with_timeout(
    transport: &dyn Transport,
    command: &Command,
    limit: Option<Duration>,
) -> Result<RawResponse, TransportError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, transport.send_command(command))
            .await
            .unwrap_or(Err(TransportError::Timeout(limit))),
        None => transport.send_command(command).await,
    }
}

/// Ordered hand-off point for push events.
#[derive(Clone)]
pub struct PushSender {
    deliver: Arc<dyn Fn(PushEvent) -> bool + Send + Sync>,
}

impl PushSender {
    /// `deliver` returns `false` once nobody is listening any more.
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(PushEvent) -> bool + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn from_channel(tx: mpsc::UnboundedSender<PushEvent>) -> Self {
        Self::new(move |event| tx.send(event).is_ok())
    }

    pub fn send(&self, event: PushEvent) -> bool {
        (self.deliver)(event)
    }
}

impl fmt::Debug for PushSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushSender").finish_non_exhaustive()
    }
}

/// Keeps a push-channel reader alive; aborts it on drop.
#[derive(Debug, Default)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// A subscription with no background reader.
    pub fn detached() -> Self {
        Self { task: None }
    }

    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_sender_reports_closed_receivers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = PushSender::from_channel(tx);
        assert!(sender.send(PushEvent::Connected));
        assert_eq!(rx.try_recv().ok(), Some(PushEvent::Connected));
        drop(rx);
        assert!(!sender.send(PushEvent::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_wraps_slow_commands() {
        let (transport, _backend) = memory::pair();
        let err = send_with_timeout(&transport, &Command::Stop, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(limit) if limit == Duration::from_millis(50)));
    }
}
