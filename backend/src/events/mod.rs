//! Scenario events: scripted crew arrivals and re-damage

pub mod handler;
pub mod types;

pub use handler::ScenarioEventHandler;
pub use types::{EventSchedule, ScenarioEvent, ScheduledEvent};
