//! Orchestrator - main restoration loop
//!
//! See `engine.rs` for the epoch loop, `config.rs` for run parameters and
//! `checkpoint.rs` for save/resume.

pub mod checkpoint;
pub mod config;
pub mod engine;

// Re-export main types for convenience
pub use config::{OrchestratorConfig, PlannerConfig};
pub use engine::{EpochRecord, Orchestrator, RunReport, RunStatus, SimulationError};

// Re-export checkpoint types
pub use checkpoint::{NodeSnapshot, StateSnapshot};
