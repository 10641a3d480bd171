pub mod log;
pub mod metrics;

pub use self::log::DiagnosticLog;
pub use self::metrics::{CounterSnapshot, EventCounters};
