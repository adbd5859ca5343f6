//! Built-in 12-node study network
//!
//! Twelve damaged distribution nodes fed from a single substation. Repair
//! times are in epochs, importance on a 1-5 scale.

use repair_planner_core_rs::{NetworkSpec, NodeSpec, RepairState};

/// Substation feeding the study network
pub const SOURCE_ID: &str = "SUB-1";

// (id, repair_time, importance, population)
const NODES: [(&str, f64, f64, u64); 12] = [
    ("EPN-1", 30.0, 5.0, 300),
    ("EPN-2", 1.0, 3.0, 100),
    ("EPN-3", 1.0, 2.0, 50),
    ("EPN-4", 0.5, 1.0, 50),
    ("EPN-5", 1.0, 4.0, 100),
    ("EPN-6", 0.5, 1.0, 50),
    ("EPN-7", 1.0, 4.0, 100),
    ("EPN-8", 7.0, 5.0, 200),
    ("EPN-9", 0.5, 2.0, 30),
    ("EPN-10", 0.5, 2.0, 30),
    ("EPN-11", 3.0, 3.0, 80),
    ("EPN-12", 30.0, 5.0, 300),
];

const EDGES: [(&str, &str); 12] = [
    (SOURCE_ID, "EPN-1"),
    ("EPN-1", "EPN-2"),
    ("EPN-1", "EPN-3"),
    ("EPN-2", "EPN-4"),
    ("EPN-2", "EPN-5"),
    ("EPN-3", "EPN-6"),
    ("EPN-5", "EPN-11"),
    ("EPN-6", "EPN-12"),
    ("EPN-8", "EPN-1"),
    ("EPN-9", "EPN-2"),
    ("EPN-10", "EPN-3"),
    ("EPN-10", "EPN-7"),
];

/// The study network with every EPN node Damaged
pub fn network_spec() -> NetworkSpec {
    let mut nodes = vec![NodeSpec {
        id: SOURCE_ID.to_string(),
        importance: 0.0,
        population_served: 0,
        repair_time: 0.0,
        initial_state: RepairState::Operational,
        success_probability: None,
        crew_cost: None,
        is_source: true,
    }];
    nodes.extend(
        NODES
            .iter()
            .map(|&(id, repair_time, importance, population)| NodeSpec {
                id: id.to_string(),
                importance,
                population_served: population,
                repair_time,
                initial_state: RepairState::Damaged,
                success_probability: None,
                crew_cost: None,
                is_source: false,
            }),
    );

    NetworkSpec {
        nodes,
        edges: EDGES
            .iter()
            .map(|&(a, b)| (a.to_string(), b.to_string()))
            .collect(),
    }
}
