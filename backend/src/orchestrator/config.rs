//! Orchestrator configuration
//!
//! Every field has a default, so a scenario file only needs to name what it
//! changes. Defaults follow the field study: five crews, 80% success per
//! attempt, repair durations jittered between 0.8× and 1.5× the estimate.

use crate::events::ScheduledEvent;
use crate::models::network::{NodeDefaults, PropagationConfig};
use crate::models::node::DurationJitter;
use crate::policy::rollout::{RolloutConfig, MAX_SHORTLIST_SIZE};
use crate::policy::{BasePolicyKind, GreedyPlanner, RepairPlanner, RolloutPolicy};
use serde::{Deserialize, Serialize};

use super::SimulationError;

/// Complete run configuration
///
/// Serialized (canonically) for the checkpoint config hash, so any change
/// here invalidates earlier snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// RNG seed for deterministic runs
    pub rng_seed: u64,

    /// Epoch budget
    pub max_epochs: usize,

    /// Crews available at epoch 0
    pub total_crews: u32,

    /// Crew cost for nodes that do not specify one
    pub default_crew_cost: u32,

    /// Per-attempt success probability for nodes that do not specify one
    pub default_success_probability: f64,

    /// Repair duration jitter; `None` makes durations exact
    pub repair_time_jitter: Option<DurationJitter>,

    pub propagation: PropagationConfig,

    pub planner: PlannerConfig,

    pub scenario_events: Vec<ScheduledEvent>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            max_epochs: 50,
            total_crews: 5,
            default_crew_cost: 1,
            default_success_probability: 0.8,
            repair_time_jitter: Some(DurationJitter {
                min_factor: 0.8,
                max_factor: 1.5,
            }),
            propagation: PropagationConfig::default(),
            planner: PlannerConfig::default(),
            scenario_events: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults applied to nodes built from a network description
    pub fn node_defaults(&self) -> NodeDefaults {
        NodeDefaults {
            success_probability: self.default_success_probability,
            crew_cost: self.default_crew_cost,
            duration_jitter: self.repair_time_jitter,
        }
    }
}

/// Planner selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerConfig {
    /// Monte Carlo rollout lookahead
    Rollout(RolloutConfig),

    /// Base heuristic without lookahead
    Greedy { base_policy: BasePolicyKind },
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig::Rollout(RolloutConfig::default())
    }
}

impl PlannerConfig {
    /// Instantiate the configured planner
    pub fn build(&self, propagation: PropagationConfig) -> Box<dyn RepairPlanner> {
        match self {
            PlannerConfig::Rollout(config) => {
                Box::new(RolloutPolicy::new(config.clone(), propagation))
            }
            PlannerConfig::Greedy { base_policy } => Box::new(GreedyPlanner::new(*base_policy)),
        }
    }
}

fn invalid(msg: impl Into<String>) -> SimulationError {
    SimulationError::InvalidConfig(msg.into())
}

fn check_probability(name: &str, p: f64) -> Result<(), SimulationError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(invalid(format!("{} must be in [0, 1], got {}", name, p)));
    }
    Ok(())
}

/// Validate everything that does not depend on the network
pub(crate) fn validate_config(config: &OrchestratorConfig) -> Result<(), SimulationError> {
    if config.max_epochs == 0 {
        return Err(invalid("max_epochs must be > 0"));
    }
    if config.default_crew_cost == 0 {
        return Err(invalid("default_crew_cost must be > 0"));
    }
    check_probability("default_success_probability", config.default_success_probability)?;

    if let Some(jitter) = config.repair_time_jitter {
        let ordered = jitter.min_factor > 0.0 && jitter.min_factor <= jitter.max_factor;
        if !(ordered && jitter.max_factor.is_finite()) {
            return Err(invalid(format!(
                "repair_time_jitter must be finite with 0 < min <= max, got ({}, {})",
                jitter.min_factor, jitter.max_factor
            )));
        }
    }

    check_probability("propagation.probability", config.propagation.probability)?;
    if !(config.propagation.decay.is_finite() && config.propagation.decay >= 0.0) {
        return Err(invalid("propagation.decay must be non-negative"));
    }

    if let PlannerConfig::Rollout(rollout) = &config.planner {
        if rollout.horizon == 0 {
            return Err(invalid("rollout horizon must be > 0"));
        }
        if rollout.replicates == 0 {
            return Err(invalid("rollout replicates must be > 0"));
        }
        if rollout.shortlist_size == 0 || rollout.shortlist_size > MAX_SHORTLIST_SIZE {
            return Err(invalid(format!(
                "rollout shortlist_size must be in 1..={}, got {}",
                MAX_SHORTLIST_SIZE, rollout.shortlist_size
            )));
        }
        if !(rollout.terminal_cost_weight.is_finite() && rollout.terminal_cost_weight >= 0.0) {
            return Err(invalid("rollout terminal_cost_weight must be non-negative"));
        }
    }

    for scheduled in &config.scenario_events {
        if let crate::events::EventSchedule::Repeating { interval: 0, .. } = scheduled.schedule {
            return Err(invalid("repeating event interval must be > 0"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        validate_config(&OrchestratorConfig::default()).unwrap();
    }

    #[test]
    fn test_shortlist_bounds() {
        for k in [0, MAX_SHORTLIST_SIZE + 1] {
            let config = OrchestratorConfig {
                planner: PlannerConfig::Rollout(RolloutConfig {
                    shortlist_size: k,
                    ..RolloutConfig::default()
                }),
                ..OrchestratorConfig::default()
            };
            assert!(matches!(
                validate_config(&config),
                Err(SimulationError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_unbounded_jitter_rejected() {
        for (min_factor, max_factor) in [(0.8, f64::INFINITY), (0.8, f64::NAN), (0.0, 1.5)] {
            let config = OrchestratorConfig {
                repair_time_jitter: Some(DurationJitter {
                    min_factor,
                    max_factor,
                }),
                ..OrchestratorConfig::default()
            };
            assert!(
                matches!(validate_config(&config), Err(SimulationError::InvalidConfig(_))),
                "({}, {}) accepted",
                min_factor,
                max_factor
            );
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "total_crews": 2,
            "planner": {"type": "greedy", "base_policy": "importance"}
        }"#;
        let config: OrchestratorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.total_crews, 2);
        assert_eq!(config.max_epochs, 50);
        assert_eq!(
            config.planner,
            PlannerConfig::Greedy {
                base_policy: BasePolicyKind::Importance
            }
        );
    }
}
