//! Domain models for the repair planner

pub mod action;
pub mod event;
pub mod network;
pub mod node;
pub mod resources;
pub mod state;

// Re-exports
pub use action::{ActionError, RepairAction};
pub use event::{Event, EventLog};
pub use network::{Network, NetworkSpec, NodeDefaults, NodeSpec, PropagationConfig, TopologyError};
pub use node::{DamagedNode, DurationJitter, NodeError, RepairOutcome, RepairState};
pub use resources::{ResourceError, ResourcePool};
pub use state::{RepairProgress, RestorationState, TransitionError};
