use log::{error, info, warn};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::presentation::{Connectivity, DashboardView, Notification, PresentationSink, Severity};

const NOTIFICATION_BACKLOG: usize = 50;

/// Writes everything to the log. Used when there is no screen to draw on.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl PresentationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Error => error!("{}", notification.message),
            Severity::Warning => warn!("{}", notification.message),
            Severity::Info | Severity::Success => info!("{}", notification.message),
        }
    }

    fn render(&self, view: &DashboardView) {
        let snapshot = &view.snapshot;
        info!(
            "[{}] {:.0}% {} | entities {} | locations {} | packets {} | cells {} | records {}",
            view.state,
            snapshot.clamped_progress(),
            snapshot.current_operation_label,
            snapshot.detected_entity_count,
            snapshot.location_count,
            snapshot.packets_analyzed,
            snapshot.unique_cell_count,
            view.records.len()
        );
    }

    fn connectivity(&self, status: Connectivity) {
        info!("backend link: {}", status.label());
    }
}

#[derive(Debug, Default)]
struct SharedState {
    view: DashboardView,
    connectivity: Connectivity,
    pending: VecDeque<Notification>,
    history: VecDeque<Notification>,
}

/// Keeps the latest view for renderers that poll, such as a GUI frame loop.
#[derive(Debug, Default)]
pub struct SharedSink {
    inner: Mutex<SharedState>,
}

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_view(&self) -> DashboardView {
        self.inner
            .lock()
            .map(|state| state.view.clone())
            .unwrap_or_default()
    }

    pub fn connectivity_status(&self) -> Connectivity {
        self.inner
            .lock()
            .map(|state| state.connectivity)
            .unwrap_or_default()
    }

    /// Notifications not yet taken by a renderer.
    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.inner
            .lock()
            .map(|mut state| state.pending.drain(..).collect())
            .unwrap_or_default()
    }

    /// The most recent notifications, oldest first, whether drained or not.
    pub fn notifications(&self) -> Vec<Notification> {
        self.inner
            .lock()
            .map(|state| state.history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn push_bounded(queue: &mut VecDeque<Notification>, notification: Notification) {
    queue.push_back(notification);
    if queue.len() > NOTIFICATION_BACKLOG {
        queue.pop_front();
    }
}

impl PresentationSink for SharedSink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut state) = self.inner.lock() {
            push_bounded(&mut state.history, notification.clone());
            push_bounded(&mut state.pending, notification);
        }
    }

    fn render(&self, view: &DashboardView) {
        if let Ok(mut state) = self.inner.lock() {
            state.view = view.clone();
        }
    }

    fn connectivity(&self, status: Connectivity) {
        if let Ok(mut state) = self.inner.lock() {
            state.connectivity = status;
        }
    }
}
