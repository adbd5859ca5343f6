//! Repair planning policies
//!
//! Each epoch the driver asks a [`RepairPlanner`] which Damaged nodes should
//! receive crews. Two layers exist:
//!
//! - **Base policies** ([`BasePolicy`]): cheap one-shot heuristics that rank
//!   Damaged nodes and greedily fill free crew capacity. They also drive the
//!   simulated future inside rollout replicates.
//! - **Planners** ([`RepairPlanner`]): what the driver calls. The
//!   [`RolloutPolicy`] scores candidate actions by Monte Carlo lookahead; the
//!   [`GreedyPlanner`] just applies a base policy.
//!
//! # Example
//!
//! ```rust
//! use repair_planner_core_rs::policy::{BasePolicy, PriorityScorePolicy};
//! use repair_planner_core_rs::{DamagedNode, Network, ResourcePool, RestorationState};
//!
//! let mut network = Network::new();
//! network.add_node(DamagedNode::new("A".to_string(), 5.0, 100, 1.0)).unwrap();
//! network.add_node(DamagedNode::new("B".to_string(), 1.0, 10, 1.0)).unwrap();
//! let state = RestorationState::new(network, ResourcePool::new(1));
//!
//! let action = PriorityScorePolicy.select(&state);
//! assert_eq!(action.node_ids(), &["A".to_string()]);
//! ```

use crate::models::action::RepairAction;
use crate::models::node::RepairState;
use crate::models::state::{RestorationState, TransitionError};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

pub mod greedy;
pub mod rollout;

pub use greedy::{GreedyPlanner, ImportancePolicy, PriorityScorePolicy};
pub use rollout::{
    CandidateScore, RolloutConfig, RolloutPolicy, RolloutStep, RolloutTrajectory,
};

/// Why a planner dispatched nothing this epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// No node is Damaged or InRepair
    AllRestored,
    /// Remaining failed nodes are all already InRepair
    NothingDispatchable,
    /// No free crews, or no Damaged node fits the free crews
    NoCapacity,
}

/// Planner output for one epoch
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Dispatch(RepairAction),
    NoOp(NoOpReason),
}

impl Decision {
    /// The action to apply (empty for a no-op)
    pub fn action(&self) -> RepairAction {
        match self {
            Decision::Dispatch(action) => action.clone(),
            Decision::NoOp(_) => RepairAction::noop(),
        }
    }

    pub fn no_op_reason(&self) -> Option<NoOpReason> {
        match self {
            Decision::Dispatch(_) => None,
            Decision::NoOp(reason) => Some(*reason),
        }
    }
}

/// One-shot dispatch heuristic
///
/// Must be pure: the same state always yields the same action. Rollout
/// replicates call it on many threads at once.
pub trait BasePolicy: Send + Sync {
    /// Pick a feasible set of Damaged nodes for the free crews
    fn select(&self, state: &RestorationState) -> RepairAction;

    fn name(&self) -> &'static str;
}

/// Per-epoch decision maker used by the driver
pub trait RepairPlanner: Send + Sync {
    /// Decide this epoch's dispatch
    ///
    /// # Arguments
    ///
    /// * `state` - Authoritative restoration state (read-only)
    /// * `epoch` - Current epoch index
    /// * `remaining_epochs` - Epochs left in the run budget, including this one
    /// * `rng` - Driver RNG; planners that need randomness draw from it
    fn decide(
        &mut self,
        state: &RestorationState,
        epoch: usize,
        remaining_epochs: usize,
        rng: &mut RngManager,
    ) -> Result<Decision, TransitionError>;

    fn name(&self) -> &'static str;
}

/// Selectable base heuristic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasePolicyKind {
    /// importance × population / repair time
    #[default]
    PriorityScore,
    /// importance only
    Importance,
}

impl BasePolicyKind {
    pub fn build(self) -> Box<dyn BasePolicy> {
        match self {
            BasePolicyKind::PriorityScore => Box::new(PriorityScorePolicy),
            BasePolicyKind::Importance => Box::new(ImportancePolicy),
        }
    }
}

/// Shared no-op detection for every planner
///
/// Checked in order: nothing failed, nothing Damaged, nothing fits.
pub(crate) fn precheck(state: &RestorationState) -> Option<NoOpReason> {
    let network = state.network();
    if network.all_restored() {
        return Some(NoOpReason::AllRestored);
    }
    let available = state.available_capacity();
    let mut any_damaged = false;
    let mut any_fits = false;
    for node in network.nodes().filter(|n| n.state() == RepairState::Damaged) {
        any_damaged = true;
        if node.crew_cost() <= available {
            any_fits = true;
        }
    }
    if !any_damaged {
        return Some(NoOpReason::NothingDispatchable);
    }
    if available == 0 || !any_fits {
        return Some(NoOpReason::NoCapacity);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::network::Network;
    use crate::models::node::DamagedNode;
    use crate::models::resources::ResourcePool;

    #[test]
    fn test_precheck_order() {
        let mut network = Network::new();
        network
            .add_node(DamagedNode::new("A".to_string(), 1.0, 1, 1.0).with_crew_cost(3))
            .unwrap();
        let state = RestorationState::new(network.clone(), ResourcePool::new(2));
        assert_eq!(precheck(&state), Some(NoOpReason::NoCapacity));

        let state = RestorationState::new(network, ResourcePool::new(3));
        assert_eq!(precheck(&state), None);

        let mut restored = Network::new();
        restored
            .add_node(
                DamagedNode::new("A".to_string(), 1.0, 1, 1.0).with_state(RepairState::Repaired),
            )
            .unwrap();
        let state = RestorationState::new(restored, ResourcePool::new(0));
        assert_eq!(precheck(&state), Some(NoOpReason::AllRestored));
    }
}
