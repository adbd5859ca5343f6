//! Damaged node model
//!
//! Represents one repairable element of the power network (substation,
//! feeder segment, distribution transformer).
//! Each node has:
//! - Importance weight and population served (immutable)
//! - Base repair-time estimate, resampled per attempt when jitter is configured
//! - Crew cost and per-attempt success probability
//! - Repair state and elapsed effort on the current attempt
//!
//! # State machine
//!
//! ```text
//! Operational ──(propagation)──► Damaged ──begin_repair──► InRepair ──success──► Repaired
//!                                  ▲                          │                   │
//!                                  └──── explicit re-damage ──┴───────────────────┘
//! ```
//!
//! A failed attempt leaves the node InRepair and starts a new attempt.

use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Repair times below this are treated as this value when ranking
const MIN_REPAIR_TIME: f64 = 1e-6;

/// Effort comparisons tolerate accumulated floating-point error
const EFFORT_EPSILON: f64 = 1e-9;

/// Repair lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepairState {
    /// Never damaged; functioning
    Operational,

    /// Damaged and waiting for a crew
    Damaged,

    /// Crew committed, repair attempt under way
    InRepair,

    /// Restored; functioning
    Repaired,
}

impl RepairState {
    /// Operational or Repaired
    pub fn is_functioning(&self) -> bool {
        matches!(self, RepairState::Operational | RepairState::Repaired)
    }

    /// Damaged or InRepair
    pub fn is_failed(&self) -> bool {
        !self.is_functioning()
    }
}

impl fmt::Display for RepairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairState::Operational => "Operational",
            RepairState::Damaged => "Damaged",
            RepairState::InRepair => "InRepair",
            RepairState::Repaired => "Repaired",
        };
        f.write_str(name)
    }
}

/// Result of advancing a repair by one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RepairOutcome {
    /// Attempt still needs more effort
    InProgress { effort: f64, required: f64 },

    /// Attempt completed and the success draw passed
    Succeeded { attempts: u32 },

    /// Attempt completed but the success draw failed; a new attempt begins
    Failed { attempts: u32 },
}

/// Multiplicative jitter applied to the base repair time on each attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationJitter {
    pub min_factor: f64,
    pub max_factor: f64,
}

impl DurationJitter {
    pub fn new(min_factor: f64, max_factor: f64) -> Self {
        assert!(
            min_factor > 0.0 && min_factor <= max_factor && max_factor.is_finite(),
            "jitter factors must be finite and satisfy 0 < min <= max"
        );
        Self {
            min_factor,
            max_factor,
        }
    }
}

/// Errors that can occur during node state transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    #[error("Invalid state transition on node {node_id}: cannot {action} while {from}")]
    InvalidStateTransition {
        node_id: String,
        from: RepairState,
        action: &'static str,
    },
}

/// A repairable network element
///
/// # Example
/// ```
/// use repair_planner_core_rs::{DamagedNode, RepairOutcome, RepairState, RngManager};
///
/// let mut rng = RngManager::new(7);
/// let mut node = DamagedNode::new("EPN-2".to_string(), 3.0, 100, 1.0)
///     .with_success_probability(1.0);
///
/// node.begin_repair(&mut rng).unwrap();
/// let outcome = node.advance_repair(1, &mut rng).unwrap();
///
/// assert_eq!(outcome, RepairOutcome::Succeeded { attempts: 1 });
/// assert_eq!(node.state(), RepairState::Repaired);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamagedNode {
    /// Unique node identifier (e.g., "EPN-1")
    id: String,

    /// Criticality score
    importance: f64,

    /// Number of people served through this element
    population_served: u64,

    /// Repair-time estimate in epochs of full staffing
    base_repair_time: f64,

    /// Repair time of the current attempt
    repair_time: f64,

    /// Crew units needed for full staffing
    crew_cost: u32,

    /// Probability that a completed attempt restores the node
    success_probability: f64,

    /// Feeds power into the network when functioning
    is_source: bool,

    /// Optional per-attempt duration jitter
    duration_jitter: Option<DurationJitter>,

    state: RepairState,

    /// Effort accumulated on the current attempt
    effort: f64,

    /// Attempts started so far (including the current one)
    attempts: u32,
}

impl DamagedNode {
    /// Create a damaged node with crew cost 1 and certain repair success
    ///
    /// # Panics
    /// Panics if importance or repair time is negative or not finite
    pub fn new(id: String, importance: f64, population_served: u64, repair_time: f64) -> Self {
        assert!(
            importance.is_finite() && importance >= 0.0,
            "importance must be non-negative"
        );
        assert!(
            repair_time.is_finite() && repair_time >= 0.0,
            "repair_time must be non-negative"
        );

        Self {
            id,
            importance,
            population_served,
            base_repair_time: repair_time,
            repair_time,
            crew_cost: 1,
            success_probability: 1.0,
            is_source: false,
            duration_jitter: None,
            state: RepairState::Damaged,
            effort: 0.0,
            attempts: 0,
        }
    }

    /// Set the per-attempt success probability (builder pattern)
    pub fn with_success_probability(mut self, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "success_probability must be between 0.0 and 1.0"
        );
        self.success_probability = probability;
        self
    }

    /// Set the crew cost (builder pattern)
    pub fn with_crew_cost(mut self, crew_cost: u32) -> Self {
        assert!(crew_cost > 0, "crew_cost must be positive");
        self.crew_cost = crew_cost;
        self
    }

    /// Set the initial state (builder pattern)
    ///
    /// # Panics
    /// Panics on `InRepair`: a repair only starts through `begin_repair`.
    pub fn with_state(mut self, state: RepairState) -> Self {
        assert!(
            state != RepairState::InRepair,
            "initial state cannot be InRepair"
        );
        self.state = state;
        self
    }

    /// Mark as a power source (builder pattern)
    pub fn as_source(mut self) -> Self {
        self.is_source = true;
        self
    }

    /// Enable per-attempt duration jitter (builder pattern)
    pub fn with_duration_jitter(mut self, jitter: Option<DurationJitter>) -> Self {
        self.duration_jitter = jitter;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn importance(&self) -> f64 {
        self.importance
    }

    pub fn population_served(&self) -> u64 {
        self.population_served
    }

    pub fn base_repair_time(&self) -> f64 {
        self.base_repair_time
    }

    /// Repair time of the current (or next) attempt
    pub fn repair_time(&self) -> f64 {
        self.repair_time
    }

    pub fn crew_cost(&self) -> u32 {
        self.crew_cost
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }

    pub fn is_source(&self) -> bool {
        self.is_source
    }

    pub fn state(&self) -> RepairState {
        self.state
    }

    pub fn effort(&self) -> f64 {
        self.effort
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Effort still needed on the current attempt
    pub fn remaining_repair_time(&self) -> f64 {
        (self.repair_time - self.effort).max(0.0)
    }

    /// Base heuristic score: importance × population / repair time
    ///
    /// # Example
    /// ```
    /// use repair_planner_core_rs::DamagedNode;
    ///
    /// let node = DamagedNode::new("A".to_string(), 5.0, 100, 2.0);
    /// assert_eq!(node.priority_score(), 250.0);
    /// ```
    pub fn priority_score(&self) -> f64 {
        self.importance * self.population_served as f64 / self.base_repair_time.max(MIN_REPAIR_TIME)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Start a repair attempt: Damaged → InRepair
    pub fn begin_repair(&mut self, rng: &mut RngManager) -> Result<(), NodeError> {
        if self.state != RepairState::Damaged {
            return Err(self.transition_error("begin repair"));
        }
        self.state = RepairState::InRepair;
        self.attempts += 1;
        self.effort = 0.0;
        self.repair_time = self.sample_repair_time(rng);
        Ok(())
    }

    /// Apply one epoch of work with `resource_committed` crew units
    ///
    /// Effort grows by the staffing ratio (capped at full staffing). Once
    /// the attempt's repair time is reached a single success draw decides
    /// the outcome; a failure resets effort and resamples the duration.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless the node is InRepair.
    pub fn advance_repair(
        &mut self,
        resource_committed: u32,
        rng: &mut RngManager,
    ) -> Result<RepairOutcome, NodeError> {
        if self.state != RepairState::InRepair {
            return Err(self.transition_error("advance repair"));
        }

        let staffing = (resource_committed as f64 / self.crew_cost as f64).min(1.0);
        self.effort += staffing;

        if self.effort + EFFORT_EPSILON < self.repair_time {
            return Ok(RepairOutcome::InProgress {
                effort: self.effort,
                required: self.repair_time,
            });
        }

        if rng.chance(self.success_probability) {
            self.state = RepairState::Repaired;
            self.effort = 0.0;
            Ok(RepairOutcome::Succeeded {
                attempts: self.attempts,
            })
        } else {
            let failed_attempts = self.attempts;
            self.attempts += 1;
            self.effort = 0.0;
            self.repair_time = self.sample_repair_time(rng);
            Ok(RepairOutcome::Failed {
                attempts: failed_attempts,
            })
        }
    }

    /// Cascading failure: Operational → Damaged
    pub fn mark_damaged(&mut self) -> Result<(), NodeError> {
        if self.state != RepairState::Operational {
            return Err(self.transition_error("propagate damage"));
        }
        self.state = RepairState::Damaged;
        Ok(())
    }

    /// Explicit re-damage event; returns the previous state
    ///
    /// Valid from any functioning state and from InRepair (the attempt is
    /// abandoned). Re-damaging a node that is already Damaged is rejected.
    pub fn redamage(&mut self) -> Result<RepairState, NodeError> {
        if self.state == RepairState::Damaged {
            return Err(self.transition_error("re-damage"));
        }
        let previous = self.state;
        self.state = RepairState::Damaged;
        self.effort = 0.0;
        self.repair_time = self.base_repair_time;
        Ok(previous)
    }

    /// Overwrite mutable progress fields from a checkpoint
    pub(crate) fn restore_progress(
        &mut self,
        state: RepairState,
        repair_time: f64,
        effort: f64,
        attempts: u32,
    ) {
        self.state = state;
        self.repair_time = repair_time;
        self.effort = effort;
        self.attempts = attempts;
    }

    fn sample_repair_time(&self, rng: &mut RngManager) -> f64 {
        match self.duration_jitter {
            Some(jitter) => {
                self.base_repair_time * rng.uniform(jitter.min_factor, jitter.max_factor)
            }
            None => self.base_repair_time,
        }
    }

    fn transition_error(&self, action: &'static str) -> NodeError {
        NodeError::InvalidStateTransition {
            node_id: self.id.clone(),
            from: self.state,
            action,
        }
    }
}
