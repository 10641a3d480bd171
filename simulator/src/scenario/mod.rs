pub mod script;

pub use script::ScenarioScript;
