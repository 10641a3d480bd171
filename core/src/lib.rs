//! Session lifecycle and real-time event synchronisation for the monitoring dashboard.
//!
//! The crate owns the client side of the dashboard protocol: a session state
//! machine driven by a single ordered inbound queue, the aggregation store that
//! backs the counters and results table, the export coordinator, and the
//! transport seam used to reach the monitoring backend.

pub mod config;
pub mod export;
pub mod prelude;
pub mod presentation;
pub mod protocol;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod transport;

pub use config::ClientConfig;
pub use prelude::{ControlError, ControlResult};
pub use session::{Controller, ControllerHandle, SessionMachine, SessionState};
