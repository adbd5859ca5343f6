//! Scenario event types
//!
//! Scenario events script exogenous changes at specific epochs: crews
//! arriving through mutual aid, or a storm cell knocking a node out again.
//!
//! # Design Principles
//!
//! 1. **Determinism**: events are scheduled by epoch, never drawn at random
//! 2. **Self-contained**: events carry all data needed for execution
//! 3. **Logged**: every execution appends to the run's event log

use serde::{Deserialize, Serialize};

/// A scripted change to the restoration state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioEvent {
    /// Additional crews join the pool permanently
    CrewArrival { crews: u32 },

    /// A node fails again
    ///
    /// An InRepair node abandons its attempt and its crews return to the
    /// pool. Targeting a node that is already Damaged has no effect.
    Redamage { node_id: String },
}

/// When to execute a scenario event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventSchedule {
    /// Execute once at a specific epoch
    OneTime { epoch: usize },

    /// Execute every `interval` epochs starting from `start_epoch`
    Repeating { start_epoch: usize, interval: usize },
}

impl EventSchedule {
    /// Check if this schedule triggers at the given epoch
    pub fn should_execute(&self, epoch: usize) -> bool {
        match self {
            EventSchedule::OneTime { epoch: at } => epoch == *at,
            EventSchedule::Repeating {
                start_epoch,
                interval,
            } => *interval > 0 && epoch >= *start_epoch && (epoch - start_epoch) % interval == 0,
        }
    }
}

/// A scenario event paired with its schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub event: ScenarioEvent,
    pub schedule: EventSchedule,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_time_schedule() {
        let schedule = EventSchedule::OneTime { epoch: 10 };

        assert!(!schedule.should_execute(9));
        assert!(schedule.should_execute(10));
        assert!(!schedule.should_execute(11));
    }

    #[test]
    fn test_repeating_schedule() {
        let schedule = EventSchedule::Repeating {
            start_epoch: 2,
            interval: 3,
        };

        assert!(!schedule.should_execute(1));
        assert!(schedule.should_execute(2));
        assert!(!schedule.should_execute(3));
        assert!(schedule.should_execute(5));
        assert!(schedule.should_execute(8));
    }

    #[test]
    fn test_zero_interval_never_fires() {
        let schedule = EventSchedule::Repeating {
            start_epoch: 0,
            interval: 0,
        };
        assert!(!schedule.should_execute(0));
    }

    #[test]
    fn test_deserialize_untagged_schedule() {
        let json = r#"{
            "event": {"type": "redamage", "node_id": "EPN-3"},
            "schedule": {"epoch": 4}
        }"#;
        let scheduled: ScheduledEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            scheduled.event,
            ScenarioEvent::Redamage {
                node_id: "EPN-3".to_string()
            }
        );
        assert_eq!(scheduled.schedule, EventSchedule::OneTime { epoch: 4 });
    }
}
