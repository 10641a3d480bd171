use serde::Serialize;
use std::sync::Mutex;

pub struct EventCounters {
    inner: Mutex<CounterSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CounterSnapshot {
    /// Push events that changed the session or its data.
    pub applied: usize,
    /// Push events or acknowledgments that arrived in the wrong state.
    pub discarded: usize,
    /// Failed operations, whatever their cause.
    pub failures: usize,
}

impl EventCounters {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CounterSnapshot::default()),
        }
    }

    pub fn record_applied(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.applied += 1;
        }
    }

    pub fn record_discarded(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.discarded += 1;
        }
    }

    pub fn record_failure(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.failures += 1;
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        if let Ok(counters) = self.inner.lock() {
            *counters
        } else {
            CounterSnapshot::default()
        }
    }
}

impl Default for EventCounters {
    fn default() -> Self {
        Self::new()
    }
}
