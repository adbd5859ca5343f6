//! Orchestrator Engine
//!
//! Main simulation loop. Owns the authoritative restoration state, the RNG
//! and the planner, and walks the epoch budget one decision at a time.
//!
//! # Architecture
//!
//! ```text
//! For each epoch t:
//! 1. Execute scheduled scenario events (crew arrivals, re-damage)
//! 2. Propagate damage to Operational neighbours of failed nodes
//! 3. Ask the planner for a decision
//! 4. Apply the chosen action (begin repairs, commit crews)
//! 5. Advance every in-progress repair by one epoch
//! 6. Recompute the service metric
//! 7. Record the epoch and advance the clock
//! ```
//!
//! # Example
//!
//! ```rust
//! use repair_planner_core_rs::orchestrator::{Orchestrator, OrchestratorConfig, RunStatus};
//! use repair_planner_core_rs::{NetworkSpec, NodeSpec, PropagationConfig, RepairState};
//!
//! let spec = NetworkSpec {
//!     nodes: vec![
//!         NodeSpec {
//!             id: "SUB".to_string(),
//!             importance: 0.0,
//!             population_served: 0,
//!             repair_time: 0.0,
//!             initial_state: RepairState::Operational,
//!             success_probability: None,
//!             crew_cost: None,
//!             is_source: true,
//!         },
//!         NodeSpec {
//!             id: "A".to_string(),
//!             importance: 5.0,
//!             population_served: 100,
//!             repair_time: 1.0,
//!             initial_state: RepairState::Damaged,
//!             success_probability: Some(1.0),
//!             crew_cost: None,
//!             is_source: false,
//!         },
//!     ],
//!     edges: vec![("SUB".to_string(), "A".to_string())],
//! };
//! let config = OrchestratorConfig {
//!     repair_time_jitter: None,
//!     propagation: PropagationConfig::disabled(),
//!     ..OrchestratorConfig::default()
//! };
//!
//! let mut orchestrator = Orchestrator::new(config, spec).unwrap();
//! let report = orchestrator.run().unwrap();
//! assert_eq!(report.status, RunStatus::Completed);
//! assert_eq!(report.final_service_metric, 1.0);
//! ```

use crate::core::time::EpochClock;
use crate::events::{ScenarioEvent, ScenarioEventHandler};
use crate::models::event::{Event, EventLog};
use crate::models::network::{Network, NetworkSpec, TopologyError};
use crate::models::resources::ResourcePool;
use crate::models::state::{RestorationState, TransitionError};
use crate::orchestrator::checkpoint::{self, NodeSnapshot, StateSnapshot};
use crate::orchestrator::config::{validate_config, OrchestratorConfig};
use crate::policy::{Decision, NoOpReason, RepairPlanner};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Results
// ============================================================================

/// Summary of one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,

    /// Service metric after this epoch's repairs
    pub service_metric: f64,

    /// Population without a functioning path to a source
    pub unserved_population: u64,

    /// Nodes that received crews this epoch
    pub dispatched: Vec<String>,

    pub repaired: Vec<String>,

    /// Nodes whose attempt completed but failed
    pub failed_attempts: Vec<String>,

    pub newly_damaged: Vec<String>,

    pub crews_committed: u32,

    pub crews_total: u32,

    pub utilization: f64,

    /// Residual damage estimate after this epoch
    pub cost_to_go: f64,

    /// Set when the planner dispatched nothing
    pub no_op: Option<NoOpReason>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every node is Operational or Repaired
    Completed,
    /// Step budget spent with failed nodes remaining
    BudgetExhausted,
}

/// Outcome of a full run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub epochs_run: usize,
    pub final_service_metric: f64,

    /// Node ids in the order their repairs succeeded
    pub repair_order: Vec<String>,

    /// Σ over epochs of unserved population
    pub unserved_population_epochs: u64,

    /// Damaged or InRepair nodes left at the end
    pub remaining_failed: Vec<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Simulation errors
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Configuration validation error
    InvalidConfig(String),

    /// Network description rejected
    Topology(TopologyError),

    /// Invariant violation while applying a transition
    Transition(TransitionError),

    /// `tick` called after the step budget was spent
    BudgetExhausted { max_epochs: usize },

    /// Snapshot could not be restored
    Checkpoint(String),

    SerializationError(String),
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            SimulationError::Topology(err) => write!(f, "Topology error: {}", err),
            SimulationError::Transition(err) => write!(f, "Transition error: {}", err),
            SimulationError::BudgetExhausted { max_epochs } => {
                write!(f, "Step budget of {} epochs exhausted", max_epochs)
            }
            SimulationError::Checkpoint(msg) => write!(f, "Checkpoint error: {}", msg),
            SimulationError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Topology(err) => Some(err),
            SimulationError::Transition(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TopologyError> for SimulationError {
    fn from(err: TopologyError) -> Self {
        SimulationError::Topology(err)
    }
}

impl From<TransitionError> for SimulationError {
    fn from(err: TransitionError) -> Self {
        SimulationError::Transition(err)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Simulation driver
pub struct Orchestrator {
    config: OrchestratorConfig,
    spec: NetworkSpec,
    state: RestorationState,
    clock: EpochClock,
    rng: RngManager,
    planner: Box<dyn RepairPlanner>,
    event_handler: ScenarioEventHandler,
    event_log: EventLog,
    trajectory: Vec<EpochRecord>,
    repair_order: Vec<String>,
    config_hash: String,
}

impl Orchestrator {
    /// Validate configuration and topology and build the initial state
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for bad parameters or events naming unknown nodes,
    /// `Topology` for malformed networks. Nothing runs until both pass.
    pub fn new(config: OrchestratorConfig, spec: NetworkSpec) -> Result<Self, SimulationError> {
        validate_config(&config)?;
        let network = Network::from_spec(&spec, &config.node_defaults())?;

        for scheduled in &config.scenario_events {
            if let ScenarioEvent::Redamage { node_id } = &scheduled.event {
                if !network.contains(node_id) {
                    return Err(SimulationError::InvalidConfig(format!(
                        "Scenario event references unknown node {}",
                        node_id
                    )));
                }
            }
        }

        let config_hash = checkpoint::compute_config_hash(&(&config, &spec))?;
        let state = RestorationState::new(network, ResourcePool::new(config.total_crews));
        let planner = config.planner.build(config.propagation);

        info!(
            nodes = state.network().num_nodes(),
            edges = state.network().num_edges(),
            crews = config.total_crews,
            planner = planner.name(),
            seed = config.rng_seed,
            "orchestrator initialised"
        );

        Ok(Self {
            clock: EpochClock::new(config.max_epochs),
            rng: RngManager::new(config.rng_seed),
            event_handler: ScenarioEventHandler::new(config.scenario_events.clone()),
            event_log: EventLog::new(),
            trajectory: Vec::new(),
            repair_order: Vec::new(),
            planner,
            state,
            config_hash,
            config,
            spec,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn current_epoch(&self) -> usize {
        self.clock.current_epoch()
    }

    pub fn remaining_epochs(&self) -> usize {
        self.clock.remaining()
    }

    pub fn state(&self) -> &RestorationState {
        &self.state
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn trajectory(&self) -> &[EpochRecord] {
        &self.trajectory
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn repair_order(&self) -> &[String] {
        &self.repair_order
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// True once every node is restored or the budget is spent
    pub fn is_finished(&self) -> bool {
        self.state.all_restored() || self.clock.is_exhausted()
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Run one epoch
    ///
    /// Any invariant violation aborts the run and is logged at error level.
    pub fn tick(&mut self) -> Result<EpochRecord, SimulationError> {
        if self.clock.is_exhausted() {
            return Err(SimulationError::BudgetExhausted {
                max_epochs: self.clock.max_epochs(),
            });
        }

        let epoch = self.clock.current_epoch();
        match self.run_epoch(epoch) {
            Ok(record) => {
                info!(
                    epoch,
                    service_metric = record.service_metric,
                    dispatched = record.dispatched.len(),
                    repaired = record.repaired.len(),
                    crews_committed = record.crews_committed,
                    "epoch complete"
                );
                self.trajectory.push(record.clone());
                self.clock.advance();
                Ok(record)
            }
            Err(err) => {
                error!(epoch, error = %err, "run aborted");
                Err(err)
            }
        }
    }

    fn run_epoch(&mut self, epoch: usize) -> Result<EpochRecord, SimulationError> {
        // STEP 1: SCENARIO EVENTS
        for event in self
            .event_handler
            .execute_epoch_events(&mut self.state, epoch)?
        {
            self.event_log.log(event);
        }

        // STEP 2: DAMAGE PROPAGATION
        let newly_damaged = self
            .state
            .propagate(epoch, &self.config.propagation, &mut self.rng);
        for node_id in &newly_damaged {
            warn!(epoch, node_id = %node_id, "damage spread to operational node");
            self.event_log.log(Event::DamagePropagated {
                epoch,
                node_id: node_id.clone(),
            });
        }

        // STEP 3: DECISION
        let remaining = self.clock.remaining();
        let decision = self
            .planner
            .decide(&self.state, epoch, remaining, &mut self.rng)?;

        // STEP 4: APPLY
        let dispatched = match &decision {
            Decision::Dispatch(action) => {
                self.state.apply_action(action, &mut self.rng)?;
                for node_id in action.node_ids() {
                    let crews = self.state.resources().committed_to(node_id).unwrap_or(0);
                    let attempt = self
                        .state
                        .network()
                        .node(node_id)
                        .map(|n| n.attempts())
                        .unwrap_or(0);
                    self.event_log.log(Event::Dispatched {
                        epoch,
                        node_id: node_id.clone(),
                        crews,
                        attempt,
                    });
                }
                action.node_ids().to_vec()
            }
            Decision::NoOp(reason) => {
                self.event_log.log(Event::NoAction {
                    epoch,
                    reason: *reason,
                });
                Vec::new()
            }
        };

        // STEP 5: ADVANCE REPAIRS
        let progress = self.state.advance_repairs(&mut self.rng)?;
        for (node_id, attempt) in &progress.failed_attempts {
            self.event_log.log(Event::RepairAttemptFailed {
                epoch,
                node_id: node_id.clone(),
                attempt: *attempt,
            });
        }
        for node_id in &progress.repaired {
            self.event_log.log(Event::RepairSucceeded {
                epoch,
                node_id: node_id.clone(),
            });
        }
        self.repair_order.extend(progress.repaired.iter().cloned());
        self.state.check_invariants()?;

        // STEP 6: METRIC
        let network = self.state.network();
        let resources = self.state.resources();
        Ok(EpochRecord {
            epoch,
            service_metric: network.compute_service_metric(),
            unserved_population: network.total_population() - network.served_population(),
            dispatched,
            repaired: progress.repaired,
            failed_attempts: progress
                .failed_attempts
                .into_iter()
                .map(|(id, _)| id)
                .collect(),
            newly_damaged,
            crews_committed: resources.committed_capacity(),
            crews_total: resources.total_capacity(),
            utilization: resources.utilization(),
            cost_to_go: network.cost_to_go(),
            no_op: decision.no_op_reason(),
        })
    }

    /// Run until every node is restored or the budget is spent
    pub fn run(&mut self) -> Result<RunReport, SimulationError> {
        while !self.is_finished() {
            self.tick()?;
        }

        let status = if self.state.all_restored() {
            RunStatus::Completed
        } else {
            RunStatus::BudgetExhausted
        };
        let report = self.report(status);
        info!(
            status = ?report.status,
            epochs = report.epochs_run,
            final_service_metric = report.final_service_metric,
            "run finished"
        );
        Ok(report)
    }

    fn report(&self, status: RunStatus) -> RunReport {
        RunReport {
            status,
            epochs_run: self.trajectory.len(),
            final_service_metric: self.state.service_metric(),
            repair_order: self.repair_order.clone(),
            unserved_population_epochs: self
                .trajectory
                .iter()
                .map(|r| r.unserved_population)
                .sum(),
            remaining_failed: self.state.network().get_damaged_nodes(),
        }
    }

    // ========================================================================
    // Checkpointing
    // ========================================================================

    /// Serialize the resumable state to JSON
    pub fn save_state(&self) -> Result<String, SimulationError> {
        let snapshot = StateSnapshot {
            current_epoch: self.clock.current_epoch(),
            rng_state: self.rng.get_state(),
            nodes: self.state.network().nodes().map(NodeSnapshot::from).collect(),
            total_crews: self.state.resources().total_capacity(),
            commitments: self.state.resources().commitments().clone(),
            trajectory: self.trajectory.clone(),
            repair_order: self.repair_order.clone(),
            config_hash: self.config_hash.clone(),
        };
        serde_json::to_string(&snapshot).map_err(|e| {
            SimulationError::SerializationError(format!("Snapshot serialization failed: {}", e))
        })
    }

    /// Resume a run from a snapshot taken under the same configuration
    ///
    /// The event log starts empty; the trajectory and repair order resume.
    pub fn load_state(
        config: OrchestratorConfig,
        spec: NetworkSpec,
        json: &str,
    ) -> Result<Self, SimulationError> {
        let snapshot: StateSnapshot = serde_json::from_str(json)
            .map_err(|e| SimulationError::Checkpoint(format!("Invalid snapshot JSON: {}", e)))?;

        let mut orchestrator = Self::new(config, spec)?;
        if snapshot.config_hash != orchestrator.config_hash {
            return Err(SimulationError::Checkpoint(
                "Snapshot was taken under a different configuration".to_string(),
            ));
        }
        checkpoint::validate_snapshot(&snapshot, orchestrator.state.network())?;
        if snapshot.current_epoch > orchestrator.config.max_epochs {
            return Err(SimulationError::Checkpoint(format!(
                "Snapshot epoch {} beyond budget {}",
                snapshot.current_epoch, orchestrator.config.max_epochs
            )));
        }

        for node in &snapshot.nodes {
            if let Some(target) = orchestrator.state.network_mut().node_mut(&node.id) {
                target.restore_progress(node.state, node.repair_time, node.effort, node.attempts);
            }
        }
        let resources = ResourcePool::from_snapshot(snapshot.total_crews, snapshot.commitments)
            .map_err(|e| SimulationError::Checkpoint(e.to_string()))?;
        orchestrator.state.replace_resources(resources);
        orchestrator.state.check_invariants()?;

        orchestrator.rng = RngManager::new(snapshot.rng_state);
        orchestrator.clock =
            EpochClock::resume_at(orchestrator.config.max_epochs, snapshot.current_epoch);
        orchestrator.trajectory = snapshot.trajectory;
        orchestrator.repair_order = snapshot.repair_order;

        info!(epoch = snapshot.current_epoch, "resumed from snapshot");
        Ok(orchestrator)
    }

    /// Network description this run was built from
    pub fn network_spec(&self) -> &NetworkSpec {
        &self.spec
    }
}
