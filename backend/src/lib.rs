//! Repair Planner Core - Rust Engine
//!
//! Sequential repair scheduling for a damaged power distribution network,
//! driven by approximate dynamic programming with Monte Carlo rollouts.
//!
//! # Architecture
//!
//! - **core**: Epoch clock
//! - **models**: Domain types (DamagedNode, Network, ResourcePool, RestorationState)
//! - **policy**: Base heuristics and the rollout planner
//! - **events**: Scripted crew arrivals and re-damage
//! - **orchestrator**: Main restoration loop and checkpointing
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Committed crews never exceed total crews
//! 2. All randomness is deterministic (seeded RNG, derived streams)
//! 3. FFI boundary is minimal and safe

// Module declarations
pub mod core;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod rng;

// Re-exports for convenience
pub use core::time::EpochClock;
pub use events::{EventSchedule, ScenarioEvent, ScheduledEvent};
pub use models::{
    action::{ActionError, RepairAction},
    event::{Event, EventLog},
    network::{Network, NetworkSpec, NodeDefaults, NodeSpec, PropagationConfig, TopologyError},
    node::{DamagedNode, DurationJitter, NodeError, RepairOutcome, RepairState},
    resources::{ResourceError, ResourcePool},
    state::{RepairProgress, RestorationState, TransitionError},
};
pub use orchestrator::{
    EpochRecord, Orchestrator, OrchestratorConfig, PlannerConfig, RunReport, RunStatus,
    SimulationError,
};
pub use policy::{BasePolicyKind, Decision, NoOpReason, RolloutConfig};
pub use rng::RngManager;

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn repair_planner_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::orchestrator::PyOrchestrator>()?;
    Ok(())
}
