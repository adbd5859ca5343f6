//! Rollout lookahead planner
//!
//! Approximate dynamic programming by Monte Carlo rollouts: every candidate
//! action for the current epoch is scored by simulating the near future
//! under a base policy on disposable copies of the state.
//!
//! # Algorithm
//!
//! 1. Shortlist the top-K Damaged nodes that fit the free crews, ranked by
//!    the base policy's key
//! 2. Enumerate maximal feasible subsets of the shortlist, topping each up
//!    with the remaining ranked nodes while crews are left
//! 3. For each candidate run M replicates of min(H, remaining) epochs:
//!    apply the candidate, then let the base policy act each later epoch
//! 4. Score = mean cumulative service metric, minus an optional terminal
//!    cost-to-go penalty
//! 5. Best score wins; near-ties go to higher aggregate importance, then to
//!    the lexicographically smallest id list
//!
//! # Determinism
//!
//! One seed is drawn from the driver RNG per scored decision. Each
//! (candidate, replicate) pair derives its own stream from that seed, and
//! scores are collected in index order, so the chosen action does not depend
//! on whether replicates ran on one thread or many.

use super::{precheck, BasePolicy, BasePolicyKind, Decision, NoOpReason, RepairPlanner};
use crate::models::action::RepairAction;
use crate::models::network::PropagationConfig;
use crate::models::node::DamagedNode;
use crate::models::state::{RestorationState, TransitionError};
use crate::policy::greedy::rank_damaged;
use crate::rng::RngManager;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Scores closer than this are treated as equal
const SCORE_TIE_TOLERANCE: f64 = 1e-9;

/// Largest accepted shortlist (2^K subsets are enumerated)
pub const MAX_SHORTLIST_SIZE: usize = 16;

/// Rollout tuning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Lookahead horizon H in epochs
    pub horizon: usize,

    /// Monte Carlo replicates M per candidate
    pub replicates: usize,

    /// Shortlist size K
    pub shortlist_size: usize,

    /// Heuristic used for the shortlist and inside replicates
    pub base_policy: BasePolicyKind,

    /// Evaluate replicates on the rayon thread pool
    pub parallel: bool,

    /// Weight of the final state's cost-to-go in the score (0 disables)
    pub terminal_cost_weight: f64,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            horizon: 5,
            replicates: 16,
            shortlist_size: 6,
            base_policy: BasePolicyKind::PriorityScore,
            parallel: true,
            terminal_cost_weight: 0.0,
        }
    }
}

/// One simulated epoch inside a replicate
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutStep {
    pub epoch: usize,
    pub action: RepairAction,
    pub repaired: Vec<String>,
    pub newly_damaged: Vec<String>,
    pub service_metric: f64,
}

/// Simulated future of one replicate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RolloutTrajectory {
    pub steps: Vec<RolloutStep>,
    pub terminal_cost_to_go: f64,
}

impl RolloutTrajectory {
    /// Sum of per-epoch service metrics
    pub fn cumulative_metric(&self) -> f64 {
        self.steps.iter().map(|s| s.service_metric).sum()
    }
}

/// Aggregated evaluation of one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub action: RepairAction,
    pub mean_reward: f64,
    pub aggregate_importance: f64,
}

/// Rollout planner
///
/// # Example
///
/// ```rust
/// use repair_planner_core_rs::policy::{Decision, RepairPlanner, RolloutConfig, RolloutPolicy};
/// use repair_planner_core_rs::{
///     DamagedNode, Network, PropagationConfig, RepairState, ResourcePool, RestorationState,
///     RngManager,
/// };
///
/// let mut network = Network::new();
/// network
///     .add_node(DamagedNode::new("SUB".to_string(), 0.0, 0, 0.0)
///         .with_state(RepairState::Operational)
///         .as_source())
///     .unwrap();
/// network.add_node(DamagedNode::new("A".to_string(), 5.0, 100, 1.0)).unwrap();
/// network.add_node(DamagedNode::new("B".to_string(), 1.0, 10, 1.0)).unwrap();
/// network.add_edge("SUB", "A").unwrap();
/// network.add_edge("A", "B").unwrap();
/// let state = RestorationState::new(network, ResourcePool::new(1));
///
/// let mut planner = RolloutPolicy::new(RolloutConfig::default(), PropagationConfig::disabled());
/// let mut rng = RngManager::new(42);
/// let decision = planner.decide(&state, 0, 10, &mut rng).unwrap();
/// assert_eq!(decision, Decision::Dispatch(
///     repair_planner_core_rs::RepairAction::new(vec!["A".to_string()])
/// ));
/// ```
pub struct RolloutPolicy {
    config: RolloutConfig,
    propagation: PropagationConfig,
    base: Box<dyn BasePolicy>,
}

impl RolloutPolicy {
    pub fn new(config: RolloutConfig, propagation: PropagationConfig) -> Self {
        let base = config.base_policy.build();
        Self {
            config,
            propagation,
            base,
        }
    }

    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    /// Damaged nodes whose crew cost fits the free crews, in base ranking order
    fn ranked_affordable<'a>(&self, state: &'a RestorationState) -> Vec<&'a DamagedNode> {
        let available = state.available_capacity();
        let mut ranked = match self.config.base_policy {
            BasePolicyKind::PriorityScore => rank_damaged(state, DamagedNode::priority_score),
            BasePolicyKind::Importance => rank_damaged(state, DamagedNode::importance),
        };
        ranked.retain(|node| node.crew_cost() <= available);
        ranked
    }

    fn shortlist_len(&self) -> usize {
        self.config.shortlist_size.min(MAX_SHORTLIST_SIZE)
    }

    /// Top-K affordable Damaged nodes by the base ranking key
    pub fn shortlist<'a>(&self, state: &'a RestorationState) -> Vec<&'a DamagedNode> {
        let mut ranked = self.ranked_affordable(state);
        ranked.truncate(self.shortlist_len());
        ranked
    }

    /// Candidate actions for the current epoch
    ///
    /// Each candidate starts from a maximal feasible subset of the
    /// shortlist: its crew cost fits the free capacity and no other
    /// shortlisted node would still fit alongside it. Crews left over are
    /// then handed to the nodes outside the shortlist in base ranking order,
    /// so K bounds the search and never the size of a dispatch. Returned in
    /// ascending bitmask order over the shortlist ranking.
    pub fn candidate_actions(&self, state: &RestorationState) -> Vec<RepairAction> {
        let mut shortlist = self.ranked_affordable(state);
        let rest = shortlist.split_off(self.shortlist_len().min(shortlist.len()));
        let available = state.available_capacity();
        let k = shortlist.len();

        let mut candidates = Vec::new();
        for mask in 1u32..(1u32 << k) {
            let cost: u32 = (0..k)
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| shortlist[i].crew_cost())
                .sum();
            if cost > available {
                continue;
            }
            let mut spare = available - cost;
            let maximal = (0..k)
                .filter(|i| mask & (1 << i) == 0)
                .all(|i| shortlist[i].crew_cost() > spare);
            if !maximal {
                continue;
            }

            let mut chosen: Vec<String> = (0..k)
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| shortlist[i].id().to_string())
                .collect();
            for node in &rest {
                if node.crew_cost() <= spare {
                    spare -= node.crew_cost();
                    chosen.push(node.id().to_string());
                }
            }

            let action = RepairAction::new(chosen);
            if state.validate_action(&action).is_ok() {
                candidates.push(action);
            }
        }
        candidates
    }

    /// Simulate one replicate of a candidate from `epoch`
    ///
    /// The candidate is applied at the first step with no further
    /// propagation (the driver has already propagated this epoch). Later
    /// steps propagate damage, then follow the base policy.
    pub fn simulate_replicate(
        &self,
        state: &RestorationState,
        candidate: &RepairAction,
        epoch: usize,
        horizon: usize,
        rng: &mut RngManager,
    ) -> Result<RolloutTrajectory, TransitionError> {
        let mut sim = state.clone();
        let mut trajectory = RolloutTrajectory::default();

        for t in 0..horizon {
            let step_epoch = epoch + t;
            let (action, newly_damaged) = if t == 0 {
                (candidate.clone(), Vec::new())
            } else {
                let damaged = sim.propagate(step_epoch, &self.propagation, rng);
                (self.base.select(&sim), damaged)
            };
            let progress = sim.step(&action, rng)?;
            trajectory.steps.push(RolloutStep {
                epoch: step_epoch,
                action,
                repaired: progress.repaired,
                newly_damaged,
                service_metric: sim.service_metric(),
            });
        }

        trajectory.terminal_cost_to_go = sim.network().cost_to_go();
        Ok(trajectory)
    }

    fn replicate_reward(&self, trajectory: &RolloutTrajectory) -> f64 {
        trajectory.cumulative_metric()
            - self.config.terminal_cost_weight * trajectory.terminal_cost_to_go
    }

    /// Score every candidate with M replicates each
    pub fn evaluate(
        &self,
        state: &RestorationState,
        candidates: &[RepairAction],
        epoch: usize,
        horizon: usize,
        seed: u64,
    ) -> Result<Vec<CandidateScore>, TransitionError> {
        let replicates = self.config.replicates.max(1);
        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..replicates).map(move |r| (c, r)))
            .collect();

        let run_job = |&(c, r): &(usize, usize)| -> Result<f64, TransitionError> {
            let mut rng = RngManager::new(RngManager::derive_seed(seed, c as u64, r as u64));
            let trajectory =
                self.simulate_replicate(state, &candidates[c], epoch, horizon, &mut rng)?;
            Ok(self.replicate_reward(&trajectory))
        };

        let rewards: Vec<f64> = if self.config.parallel {
            jobs.par_iter().map(run_job).collect::<Result<_, _>>()?
        } else {
            jobs.iter().map(run_job).collect::<Result<_, _>>()?
        };

        let scores = candidates
            .iter()
            .enumerate()
            .map(|(c, action)| {
                let total: f64 = rewards[c * replicates..(c + 1) * replicates].iter().sum();
                let score = CandidateScore {
                    action: action.clone(),
                    mean_reward: total / replicates as f64,
                    aggregate_importance: action.aggregate_importance(state.network()),
                };
                debug!(
                    epoch,
                    nodes = ?score.action.node_ids(),
                    mean_reward = score.mean_reward,
                    "candidate scored"
                );
                score
            })
            .collect();
        Ok(scores)
    }
}

/// Ordering where `Greater` means `a` beats `b`
fn compare_scores(a: &CandidateScore, b: &CandidateScore) -> Ordering {
    let diff = a.mean_reward - b.mean_reward;
    if diff.abs() > SCORE_TIE_TOLERANCE {
        return if diff > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    let diff = a.aggregate_importance - b.aggregate_importance;
    if diff.abs() > SCORE_TIE_TOLERANCE {
        return if diff > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    // Smaller id list wins
    b.action.node_ids().cmp(a.action.node_ids())
}

/// Pick the winning candidate
pub fn select_best(scores: &[CandidateScore]) -> Option<&CandidateScore> {
    scores.iter().fold(None, |best, s| match best {
        Some(b) if compare_scores(b, s) != Ordering::Less => Some(b),
        _ => Some(s),
    })
}

impl RepairPlanner for RolloutPolicy {
    fn decide(
        &mut self,
        state: &RestorationState,
        epoch: usize,
        remaining_epochs: usize,
        rng: &mut RngManager,
    ) -> Result<Decision, TransitionError> {
        if let Some(reason) = precheck(state) {
            return Ok(Decision::NoOp(reason));
        }

        let mut candidates = self.candidate_actions(state);
        match candidates.len() {
            0 => Ok(Decision::NoOp(NoOpReason::NoCapacity)),
            1 => Ok(Decision::Dispatch(candidates.remove(0))),
            _ => {
                let horizon = self.config.horizon.min(remaining_epochs).max(1);
                let seed = rng.next();
                let scores = self.evaluate(state, &candidates, epoch, horizon, seed)?;
                match select_best(&scores) {
                    Some(best) => Ok(Decision::Dispatch(best.action.clone())),
                    None => Ok(Decision::NoOp(NoOpReason::NoCapacity)),
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "rollout"
    }
}
