//! Repair actions
//!
//! An action is the set of Damaged nodes that receive crews in one epoch.
//! The empty action is the no-op.

use crate::models::network::Network;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons an action cannot be applied to the current state
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    #[error("Infeasible action: needs {required} crews, {available} available")]
    InfeasibleAction { required: u32, available: u32 },

    #[error("Node {node_id} cannot be dispatched: {reason}")]
    NotDispatchable { node_id: String, reason: String },
}

/// Crew dispatch decision for one epoch
///
/// Node ids are kept sorted and unique, so two actions naming the same nodes
/// compare equal regardless of construction order.
///
/// # Example
/// ```
/// use repair_planner_core_rs::RepairAction;
///
/// let action = RepairAction::new(vec!["B".to_string(), "A".to_string(), "B".to_string()]);
/// assert_eq!(action.node_ids(), &["A".to_string(), "B".to_string()]);
/// assert!(RepairAction::noop().is_noop());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepairAction {
    node_ids: Vec<String>,
}

impl RepairAction {
    pub fn new(mut node_ids: Vec<String>) -> Self {
        node_ids.sort();
        node_ids.dedup();
        Self { node_ids }
    }

    pub fn noop() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.node_ids.is_empty()
    }

    pub fn node_ids(&self) -> &[String] {
        &self.node_ids
    }

    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    /// Sum of crew costs of the named nodes (unknown ids count as 0)
    pub fn total_cost(&self, network: &Network) -> u32 {
        self.node_ids
            .iter()
            .filter_map(|id| network.node(id))
            .map(|n| n.crew_cost())
            .sum()
    }

    /// Sum of importance of the named nodes
    pub fn aggregate_importance(&self, network: &Network) -> f64 {
        self.node_ids
            .iter()
            .filter_map(|id| network.node(id))
            .map(|n| n.importance())
            .sum()
    }
}
