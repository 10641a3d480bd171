pub mod controller;
pub mod machine;
pub mod state;

pub use controller::{Controller, ControllerHandle};
pub use machine::{AttemptId, Outcome, SessionMachine};
pub use state::{Session, SessionState};
