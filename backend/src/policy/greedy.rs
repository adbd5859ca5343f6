//! Greedy base heuristics
//!
//! Rank Damaged nodes by a key (descending, ties by id) and take them in
//! order while their crew cost fits the free capacity. A node that does not
//! fit is skipped, so a cheaper lower-ranked node can still be dispatched.

use super::{precheck, BasePolicy, BasePolicyKind, Decision, RepairPlanner};
use crate::models::action::RepairAction;
use crate::models::node::{DamagedNode, RepairState};
use crate::models::state::{RestorationState, TransitionError};
use crate::rng::RngManager;
use std::cmp::Ordering;

/// Damaged nodes sorted by `key` descending, ties broken by id
pub(crate) fn rank_damaged<'a, F>(state: &'a RestorationState, key: F) -> Vec<&'a DamagedNode>
where
    F: Fn(&DamagedNode) -> f64,
{
    let mut nodes: Vec<&DamagedNode> = state
        .network()
        .nodes()
        .filter(|n| n.state() == RepairState::Damaged)
        .collect();
    nodes.sort_by(|a, b| {
        key(*b)
            .partial_cmp(&key(*a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id().cmp(b.id()))
    });
    nodes
}

fn fill_capacity(ranked: &[&DamagedNode], mut available: u32) -> RepairAction {
    let mut chosen = Vec::new();
    for node in ranked {
        if node.crew_cost() <= available {
            available -= node.crew_cost();
            chosen.push(node.id().to_string());
        }
    }
    RepairAction::new(chosen)
}

/// Highest importance × population / repair time first
pub struct PriorityScorePolicy;

impl BasePolicy for PriorityScorePolicy {
    fn select(&self, state: &RestorationState) -> RepairAction {
        let ranked = rank_damaged(state, DamagedNode::priority_score);
        fill_capacity(&ranked, state.available_capacity())
    }

    fn name(&self) -> &'static str {
        "priority_score"
    }
}

/// Highest importance first
pub struct ImportancePolicy;

impl BasePolicy for ImportancePolicy {
    fn select(&self, state: &RestorationState) -> RepairAction {
        let ranked = rank_damaged(state, DamagedNode::importance);
        fill_capacity(&ranked, state.available_capacity())
    }

    fn name(&self) -> &'static str {
        "importance"
    }
}

/// Runs a base policy directly, without lookahead
pub struct GreedyPlanner {
    base: Box<dyn BasePolicy>,
}

impl GreedyPlanner {
    pub fn new(kind: BasePolicyKind) -> Self {
        Self { base: kind.build() }
    }
}

impl RepairPlanner for GreedyPlanner {
    fn decide(
        &mut self,
        state: &RestorationState,
        _epoch: usize,
        _remaining_epochs: usize,
        _rng: &mut RngManager,
    ) -> Result<Decision, TransitionError> {
        if let Some(reason) = precheck(state) {
            return Ok(Decision::NoOp(reason));
        }
        let action = self.base.select(state);
        state.validate_action(&action)?;
        Ok(Decision::Dispatch(action))
    }

    fn name(&self) -> &'static str {
        self.base.name()
    }
}
