//! Restoration state
//!
//! Bundles the network and the crew pool into one explicitly owned value.
//! The simulation driver holds the authoritative copy; rollout replicates
//! clone it and step their disposable copies with the same transition code,
//! so lookahead and reality can never drift apart.
//!
//! # Critical Invariants
//!
//! 1. **Commitment validity**: crews are committed to a node iff it is InRepair
//! 2. **Capacity**: committed crews never exceed total crews
//! 3. **Determinism**: nodes are processed in id order

use crate::models::action::{ActionError, RepairAction};
use crate::models::network::{Network, PropagationConfig};
use crate::models::node::{NodeError, RepairOutcome, RepairState};
use crate::models::resources::{ResourceError, ResourcePool};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from applying a transition to the restoration state
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransitionError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Unknown node {0}")]
    UnknownNode(String),
}

/// Repair progress made in one epoch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairProgress {
    /// Nodes restored this epoch, in id order
    pub repaired: Vec<String>,

    /// Nodes whose attempt completed but failed, with the attempt number
    pub failed_attempts: Vec<(String, u32)>,
}

/// Network plus crew pool
///
/// # Example
/// ```
/// use repair_planner_core_rs::{
///     DamagedNode, Network, RepairAction, RepairState, ResourcePool, RestorationState, RngManager,
/// };
///
/// let mut network = Network::new();
/// network.add_node(DamagedNode::new("A".to_string(), 5.0, 100, 1.0)).unwrap();
/// let mut state = RestorationState::new(network, ResourcePool::new(1));
/// let mut rng = RngManager::new(1);
///
/// let progress = state
///     .step(&RepairAction::new(vec!["A".to_string()]), &mut rng)
///     .unwrap();
/// assert_eq!(progress.repaired, vec!["A".to_string()]);
/// assert_eq!(state.resources().available_capacity(), 1);
/// assert_eq!(state.network().node("A").unwrap().state(), RepairState::Repaired);
/// ```
#[derive(Debug, Clone)]
pub struct RestorationState {
    network: Network,
    resources: ResourcePool,
}

impl RestorationState {
    pub fn new(network: Network, resources: ResourcePool) -> Self {
        Self { network, resources }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Direct network access bypasses commitment bookkeeping; tests only
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    pub fn available_capacity(&self) -> u32 {
        self.resources.available_capacity()
    }

    pub fn all_restored(&self) -> bool {
        self.network.all_restored()
    }

    pub fn service_metric(&self) -> f64 {
        self.network.compute_service_metric()
    }

    /// Check an action against node states and free capacity
    pub fn validate_action(&self, action: &RepairAction) -> Result<(), ActionError> {
        for id in action.node_ids() {
            match self.network.node(id) {
                None => {
                    return Err(ActionError::NotDispatchable {
                        node_id: id.clone(),
                        reason: "unknown node".to_string(),
                    })
                }
                Some(node) if node.state() != RepairState::Damaged => {
                    return Err(ActionError::NotDispatchable {
                        node_id: id.clone(),
                        reason: format!("node is {}", node.state()),
                    })
                }
                Some(_) => {}
            }
        }

        let required = action.total_cost(&self.network);
        let available = self.available_capacity();
        if required > available {
            return Err(ActionError::InfeasibleAction {
                required,
                available,
            });
        }
        Ok(())
    }

    /// Start repairs on every node of the action and commit their crews
    pub fn apply_action(
        &mut self,
        action: &RepairAction,
        rng: &mut RngManager,
    ) -> Result<(), TransitionError> {
        self.validate_action(action)?;

        for id in action.node_ids() {
            let node = self
                .network
                .node_mut(id)
                .ok_or_else(|| TransitionError::UnknownNode(id.clone()))?;
            let cost = node.crew_cost();
            node.begin_repair(rng)?;
            if !self.resources.try_commit(id, cost) {
                return Err(ActionError::InfeasibleAction {
                    required: cost,
                    available: self.resources.available_capacity(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Work one epoch on every InRepair node; release crews on success
    pub fn advance_repairs(
        &mut self,
        rng: &mut RngManager,
    ) -> Result<RepairProgress, TransitionError> {
        let mut progress = RepairProgress::default();

        for id in self.network.nodes_in_state(RepairState::InRepair) {
            let committed = self
                .resources
                .committed_to(&id)
                .ok_or_else(|| ResourceError::NotCommitted(id.clone()))?;
            let node = self
                .network
                .node_mut(&id)
                .ok_or_else(|| TransitionError::UnknownNode(id.clone()))?;

            match node.advance_repair(committed, rng)? {
                RepairOutcome::Succeeded { .. } => {
                    self.resources.release(&id)?;
                    progress.repaired.push(id);
                }
                RepairOutcome::Failed { attempts } => {
                    progress.failed_attempts.push((id, attempts));
                }
                RepairOutcome::InProgress { .. } => {}
            }
        }

        self.resources.check_invariants()?;
        Ok(progress)
    }

    /// Apply an action then advance all repairs by one epoch
    pub fn step(
        &mut self,
        action: &RepairAction,
        rng: &mut RngManager,
    ) -> Result<RepairProgress, TransitionError> {
        if !action.is_noop() {
            self.apply_action(action, rng)?;
        }
        self.advance_repairs(rng)
    }

    /// Cascading damage for this epoch; returns newly damaged ids
    pub fn propagate(
        &mut self,
        epoch: usize,
        config: &PropagationConfig,
        rng: &mut RngManager,
    ) -> Vec<String> {
        self.network.apply_damage_propagation(epoch, config, rng)
    }

    /// Explicit re-damage; frees the crews of an abandoned repair
    ///
    /// Returns the node's previous state.
    pub fn redamage(&mut self, node_id: &str) -> Result<RepairState, TransitionError> {
        let previous = self
            .network
            .redamage(node_id)?
            .ok_or_else(|| TransitionError::UnknownNode(node_id.to_string()))?;
        if previous == RepairState::InRepair {
            self.resources.release(node_id)?;
        }
        Ok(previous)
    }

    /// Mutual-aid crew arrival
    pub fn add_crews(&mut self, crews: u32) {
        self.resources.add_crews(crews);
    }

    /// Restore the crew pool from a checkpoint
    pub(crate) fn replace_resources(&mut self, resources: ResourcePool) {
        self.resources = resources;
    }

    /// Verify both capacity and commitment-validity invariants
    pub fn check_invariants(&self) -> Result<(), TransitionError> {
        self.resources.check_invariants()?;
        for id in self.resources.commitments().keys() {
            let state = self
                .network
                .node(id)
                .map(|n| n.state())
                .ok_or_else(|| TransitionError::UnknownNode(id.clone()))?;
            if state != RepairState::InRepair {
                return Err(ActionError::NotDispatchable {
                    node_id: id.clone(),
                    reason: format!("crews committed while {}", state),
                }
                .into());
            }
        }
        for id in self.network.nodes_in_state(RepairState::InRepair) {
            if self.resources.committed_to(&id).is_none() {
                return Err(ResourceError::NotCommitted(id).into());
            }
        }
        Ok(())
    }
}
