//! Event logging for replay and auditing.
//!
//! Every significant state change of a run is captured as an [`Event`]:
//! - **Dispatch**: crews sent to a node
//! - **Repair**: attempt succeeded or failed
//! - **Damage**: cascading or scripted re-damage
//! - **Resources**: mutual-aid crews arriving
//! - **Planner**: epochs where nothing was dispatched
//!
//! # Example
//!
//! ```rust
//! use repair_planner_core_rs::models::Event;
//!
//! let event = Event::Dispatched {
//!     epoch: 3,
//!     node_id: "EPN-1".to_string(),
//!     crews: 2,
//!     attempt: 1,
//! };
//!
//! assert_eq!(event.epoch(), 3);
//! assert_eq!(event.event_type(), "dispatched");
//! ```

use crate::policy::NoOpReason;
use serde::Serialize;

/// Run event capturing a state change.
///
/// Events within an epoch are logged in the order the driver applies them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Crews committed to a Damaged node
    Dispatched {
        epoch: usize,
        node_id: String,
        crews: u32,
        attempt: u32,
    },

    RepairSucceeded {
        epoch: usize,
        node_id: String,
    },

    /// Attempt finished but the success draw failed; node stays InRepair
    RepairAttemptFailed {
        epoch: usize,
        node_id: String,
        attempt: u32,
    },

    DamagePropagated {
        epoch: usize,
        node_id: String,
    },

    /// Scripted re-damage of a node
    NodeRedamaged {
        epoch: usize,
        node_id: String,
        previous_state: String,
    },

    CrewsArrived {
        epoch: usize,
        crews: u32,
        new_total: u32,
    },

    NoAction {
        epoch: usize,
        reason: NoOpReason,
    },
}

impl Event {
    /// Epoch this event occurred in
    pub fn epoch(&self) -> usize {
        match self {
            Event::Dispatched { epoch, .. }
            | Event::RepairSucceeded { epoch, .. }
            | Event::RepairAttemptFailed { epoch, .. }
            | Event::DamagePropagated { epoch, .. }
            | Event::NodeRedamaged { epoch, .. }
            | Event::CrewsArrived { epoch, .. }
            | Event::NoAction { epoch, .. } => *epoch,
        }
    }

    /// Snake-case event name, matching the serialized tag
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Dispatched { .. } => "dispatched",
            Event::RepairSucceeded { .. } => "repair_succeeded",
            Event::RepairAttemptFailed { .. } => "repair_attempt_failed",
            Event::DamagePropagated { .. } => "damage_propagated",
            Event::NodeRedamaged { .. } => "node_redamaged",
            Event::CrewsArrived { .. } => "crews_arrived",
            Event::NoAction { .. } => "no_action",
        }
    }

    /// Node this event concerns, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Event::Dispatched { node_id, .. }
            | Event::RepairSucceeded { node_id, .. }
            | Event::RepairAttemptFailed { node_id, .. }
            | Event::DamagePropagated { node_id, .. }
            | Event::NodeRedamaged { node_id, .. } => Some(node_id),
            Event::CrewsArrived { .. } | Event::NoAction { .. } => None,
        }
    }
}

/// Append-only event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events for a specific epoch
    pub fn events_at(&self, epoch: usize) -> Vec<&Event> {
        self.events.iter().filter(|e| e.epoch() == epoch).collect()
    }

    /// Events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Events for a specific node
    pub fn events_for_node(&self, node_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.node_id() == Some(node_id))
            .collect()
    }
}
