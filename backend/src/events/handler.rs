//! Scenario event execution and scheduling

use crate::events::types::{ScenarioEvent, ScheduledEvent};
use crate::models::node::RepairState;
use crate::models::state::{RestorationState, TransitionError};
use crate::models::Event;
use tracing::info;

/// Handles scenario event scheduling and execution
#[derive(Debug, Clone, Default)]
pub struct ScenarioEventHandler {
    events: Vec<ScheduledEvent>,
}

impl ScenarioEventHandler {
    pub fn new(events: Vec<ScheduledEvent>) -> Self {
        Self { events }
    }

    /// Events scheduled for a specific epoch, in configuration order
    pub fn get_events_for_epoch(&self, epoch: usize) -> Vec<&ScenarioEvent> {
        self.events
            .iter()
            .filter(|scheduled| scheduled.schedule.should_execute(epoch))
            .map(|scheduled| &scheduled.event)
            .collect()
    }

    /// Execute all events scheduled for the given epoch
    ///
    /// Returns the log entries produced; events with no effect produce none.
    pub fn execute_epoch_events(
        &self,
        state: &mut RestorationState,
        epoch: usize,
    ) -> Result<Vec<Event>, TransitionError> {
        let mut logged = Vec::new();
        for event in self.get_events_for_epoch(epoch) {
            if let Some(entry) = event.execute(state, epoch)? {
                logged.push(entry);
            }
        }
        Ok(logged)
    }
}

impl ScenarioEvent {
    /// Execute this event against the state
    pub fn execute(
        &self,
        state: &mut RestorationState,
        epoch: usize,
    ) -> Result<Option<Event>, TransitionError> {
        match self {
            ScenarioEvent::CrewArrival { crews } => {
                state.add_crews(*crews);
                let new_total = state.resources().total_capacity();
                info!(epoch, crews, new_total, "mutual-aid crews arrived");
                Ok(Some(Event::CrewsArrived {
                    epoch,
                    crews: *crews,
                    new_total,
                }))
            }

            ScenarioEvent::Redamage { node_id } => {
                let current = state
                    .network()
                    .node(node_id)
                    .map(|n| n.state())
                    .ok_or_else(|| TransitionError::UnknownNode(node_id.clone()))?;
                if current == RepairState::Damaged {
                    return Ok(None);
                }
                let previous = state.redamage(node_id)?;
                info!(epoch, node_id = %node_id, from = %previous, "node re-damaged");
                Ok(Some(Event::NodeRedamaged {
                    epoch,
                    node_id: node_id.clone(),
                    previous_state: previous.to_string(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventSchedule;
    use crate::models::network::Network;
    use crate::models::node::DamagedNode;
    use crate::models::resources::ResourcePool;

    fn state() -> RestorationState {
        let mut network = Network::new();
        network
            .add_node(DamagedNode::new("A".to_string(), 1.0, 10, 1.0))
            .unwrap();
        RestorationState::new(network, ResourcePool::new(1))
    }

    #[test]
    fn test_redamage_of_damaged_node_is_silent() {
        let mut state = state();
        let event = ScenarioEvent::Redamage {
            node_id: "A".to_string(),
        };
        assert_eq!(event.execute(&mut state, 0).unwrap(), None);
    }

    #[test]
    fn test_unknown_node_errors() {
        let mut state = state();
        let event = ScenarioEvent::Redamage {
            node_id: "missing".to_string(),
        };
        assert_eq!(
            event.execute(&mut state, 0),
            Err(TransitionError::UnknownNode("missing".to_string()))
        );
    }

    #[test]
    fn test_repeating_crew_arrivals() {
        let handler = ScenarioEventHandler::new(vec![ScheduledEvent {
            event: ScenarioEvent::CrewArrival { crews: 2 },
            schedule: EventSchedule::Repeating {
                start_epoch: 1,
                interval: 2,
            },
        }]);
        let mut state = state();
        for epoch in 0..4 {
            handler.execute_epoch_events(&mut state, epoch).unwrap();
        }
        // fires at 1 and 3
        assert_eq!(state.resources().total_capacity(), 5);
    }
}
