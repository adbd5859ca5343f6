//! Integration tests for the restoration loop
//!
//! These tests drive complete runs through `Orchestrator` and check the
//! end-to-end scenarios: dispatch order, capacity starvation, already
//! restored networks, and repairs that never succeed.

use repair_planner_core_rs::orchestrator::{
    Orchestrator, OrchestratorConfig, PlannerConfig, RunStatus, SimulationError,
};
use repair_planner_core_rs::policy::{BasePolicyKind, NoOpReason, RolloutConfig};
use repair_planner_core_rs::{
    NetworkSpec, NodeSpec, PropagationConfig, RepairState, TopologyError,
};

fn node(id: &str, importance: f64, population: u64, repair_time: f64) -> NodeSpec {
    NodeSpec {
        id: id.to_string(),
        importance,
        population_served: population,
        repair_time,
        initial_state: RepairState::Damaged,
        success_probability: None,
        crew_cost: None,
        is_source: false,
    }
}

fn source(id: &str) -> NodeSpec {
    NodeSpec {
        initial_state: RepairState::Operational,
        is_source: true,
        ..node(id, 0.0, 0, 0.0)
    }
}

fn edge(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

/// Deterministic repairs: no jitter, certain success, no cascading damage
fn exact_config(crews: u32) -> OrchestratorConfig {
    OrchestratorConfig {
        total_crews: crews,
        max_epochs: 10,
        default_success_probability: 1.0,
        repair_time_jitter: None,
        propagation: PropagationConfig::disabled(),
        ..OrchestratorConfig::default()
    }
}

/// SUB - A - B, A far more important than B
fn chain_spec() -> NetworkSpec {
    NetworkSpec {
        nodes: vec![
            source("SUB"),
            node("A", 5.0, 100, 1.0),
            node("B", 1.0, 10, 1.0),
        ],
        edges: vec![edge("SUB", "A"), edge("A", "B")],
    }
}

/// The 12-node field-study network plus its substation
fn study_spec() -> NetworkSpec {
    let data: [(&str, f64, f64, u64); 12] = [
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
    let mut nodes = vec![source("SUB-1")];
    nodes.extend(
        data.iter()
            .map(|&(id, rt, imp, pop)| node(id, imp, pop, rt)),
    );
    let edges = [
        ("SUB-1", "EPN-1"),
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
    ]
    .iter()
    .map(|&(a, b)| edge(a, b))
    .collect();
    NetworkSpec { nodes, edges }
}

fn small_rollout(parallel: bool) -> PlannerConfig {
    PlannerConfig::Rollout(RolloutConfig {
        horizon: 3,
        replicates: 4,
        shortlist_size: 4,
        parallel,
        ..RolloutConfig::default()
    })
}

#[test]
fn test_important_upstream_node_repaired_first() {
    let mut orchestrator = Orchestrator::new(exact_config(1), chain_spec()).unwrap();

    let first = orchestrator.tick().unwrap();
    assert_eq!(first.dispatched, vec!["A".to_string()]);
    assert_eq!(first.repaired, vec!["A".to_string()]);
    assert!((first.service_metric - 100.0 / 110.0).abs() < 1e-12);

    let report = orchestrator.run().unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.epochs_run, 2);
    assert_eq!(report.repair_order, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(report.final_service_metric, 1.0);
    // epoch 0: B unserved (10); epoch 1: none
    assert_eq!(report.unserved_population_epochs, 10);
}

#[test]
fn test_upstream_node_first_even_when_slower() {
    let spec = NetworkSpec {
        nodes: vec![
            source("SUB"),
            node("A", 5.0, 100, 2.0),
            node("B", 1.0, 10, 1.0),
        ],
        edges: vec![edge("SUB", "A"), edge("A", "B")],
    };
    for seed in [1, 7, 42, 1234, 2024] {
        let config = OrchestratorConfig {
            rng_seed: seed,
            ..exact_config(1)
        };
        let mut orchestrator = Orchestrator::new(config, spec.clone()).unwrap();
        let first = orchestrator.tick().unwrap();
        assert_eq!(first.dispatched, vec!["A".to_string()], "seed {}", seed);

        let report = orchestrator.run().unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.epochs_run, 3);
        assert_eq!(report.repair_order, vec!["A".to_string(), "B".to_string()]);
    }
}

#[test]
fn test_zero_capacity_never_dispatches() {
    let mut orchestrator = Orchestrator::new(exact_config(0), chain_spec()).unwrap();
    let report = orchestrator.run().unwrap();

    assert_eq!(report.status, RunStatus::BudgetExhausted);
    assert_eq!(report.epochs_run, 10);
    for record in orchestrator.trajectory() {
        assert_eq!(record.no_op, Some(NoOpReason::NoCapacity));
        assert!(record.dispatched.is_empty());
        assert_eq!(record.service_metric, 0.0);
    }
    assert_eq!(
        report.remaining_failed,
        vec!["A".to_string(), "B".to_string()]
    );
}

#[test]
fn test_already_restored_network() {
    let mut spec = chain_spec();
    for n in spec.nodes.iter_mut().skip(1) {
        n.initial_state = RepairState::Repaired;
    }

    let mut orchestrator = Orchestrator::new(exact_config(2), spec.clone()).unwrap();
    let record = orchestrator.tick().unwrap();
    assert_eq!(record.no_op, Some(NoOpReason::AllRestored));
    assert_eq!(record.service_metric, 1.0);

    let mut orchestrator = Orchestrator::new(exact_config(2), spec).unwrap();
    let report = orchestrator.run().unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.epochs_run, 0);
    assert_eq!(report.final_service_metric, 1.0);
}

#[test]
fn test_impossible_repair_exhausts_budget() {
    let mut spec = chain_spec();
    spec.nodes.truncate(2);
    spec.edges.truncate(1);
    spec.nodes[1].success_probability = Some(0.0);

    let mut orchestrator = Orchestrator::new(exact_config(1), spec).unwrap();
    let report = orchestrator.run().unwrap();

    assert_eq!(report.status, RunStatus::BudgetExhausted);
    assert_eq!(report.remaining_failed, vec!["A".to_string()]);
    assert_eq!(
        orchestrator.state().network().node("A").unwrap().state(),
        RepairState::InRepair
    );
    // dispatched once, then every attempt fails
    assert_eq!(orchestrator.trajectory()[0].dispatched, vec!["A".to_string()]);
    for record in orchestrator.trajectory() {
        assert_eq!(record.failed_attempts, vec!["A".to_string()]);
        assert_eq!(record.crews_committed, 1);
    }
    for record in &orchestrator.trajectory()[1..] {
        assert_eq!(record.no_op, Some(NoOpReason::NothingDispatchable));
    }
}

#[test]
fn test_tick_after_budget_errors() {
    let config = OrchestratorConfig {
        max_epochs: 1,
        ..exact_config(0)
    };
    let mut orchestrator = Orchestrator::new(config, chain_spec()).unwrap();
    orchestrator.tick().unwrap();
    assert_eq!(
        orchestrator.tick().unwrap_err(),
        SimulationError::BudgetExhausted { max_epochs: 1 }
    );
}

#[test]
fn test_same_seed_same_trajectory() {
    let config = OrchestratorConfig {
        max_epochs: 15,
        total_crews: 3,
        planner: small_rollout(true),
        ..OrchestratorConfig::default()
    };
    let mut a = Orchestrator::new(config.clone(), study_spec()).unwrap();
    let mut b = Orchestrator::new(config, study_spec()).unwrap();
    let ra = a.run().unwrap();
    let rb = b.run().unwrap();

    assert_eq!(ra, rb);
    assert_eq!(a.trajectory(), b.trajectory());
}

#[test]
fn test_parallel_matches_sequential_run() {
    let base = OrchestratorConfig {
        max_epochs: 12,
        total_crews: 3,
        rng_seed: 2024,
        ..OrchestratorConfig::default()
    };
    let mut par = Orchestrator::new(
        OrchestratorConfig {
            planner: small_rollout(true),
            ..base.clone()
        },
        study_spec(),
    )
    .unwrap();
    let mut seq = Orchestrator::new(
        OrchestratorConfig {
            planner: small_rollout(false),
            ..base
        },
        study_spec(),
    )
    .unwrap();

    par.run().unwrap();
    seq.run().unwrap();
    assert_eq!(par.trajectory(), seq.trajectory());
}

#[test]
fn test_metric_monotone_without_propagation() {
    let config = OrchestratorConfig {
        max_epochs: 30,
        total_crews: 2,
        propagation: PropagationConfig::disabled(),
        planner: small_rollout(true),
        ..OrchestratorConfig::default()
    };
    let mut orchestrator = Orchestrator::new(config, study_spec()).unwrap();
    orchestrator.run().unwrap();

    let metrics: Vec<f64> = orchestrator
        .trajectory()
        .iter()
        .map(|r| r.service_metric)
        .collect();
    for pair in metrics.windows(2) {
        assert!(pair[1] >= pair[0], "metric decreased: {:?}", pair);
    }
}

#[test]
fn test_invariants_hold_every_epoch() {
    let config = OrchestratorConfig {
        max_epochs: 20,
        total_crews: 4,
        planner: small_rollout(true),
        ..OrchestratorConfig::default()
    };
    let mut orchestrator = Orchestrator::new(config, study_spec()).unwrap();
    while !orchestrator.is_finished() {
        let record = orchestrator.tick().unwrap();
        assert!(record.crews_committed <= record.crews_total);
        assert!((0.0..=1.0).contains(&record.service_metric));
        orchestrator.state().check_invariants().unwrap();
    }
}

#[test]
fn test_greedy_planner_runs() {
    let config = OrchestratorConfig {
        planner: PlannerConfig::Greedy {
            base_policy: BasePolicyKind::Importance,
        },
        ..exact_config(1)
    };
    let mut orchestrator = Orchestrator::new(config, chain_spec()).unwrap();
    let report = orchestrator.run().unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.repair_order, vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn test_topology_errors_surface_before_run() {
    let mut spec = chain_spec();
    spec.edges.push(edge("B", "MISSING"));
    assert!(matches!(
        Orchestrator::new(exact_config(1), spec),
        Err(SimulationError::Topology(TopologyError::UnknownNode(id))) if id == "MISSING"
    ));

    let mut spec = chain_spec();
    spec.edges.push(edge("A", "A"));
    assert!(matches!(
        Orchestrator::new(exact_config(1), spec),
        Err(SimulationError::Topology(TopologyError::SelfLoop(_)))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let zero_horizon = OrchestratorConfig {
        planner: PlannerConfig::Rollout(RolloutConfig {
            horizon: 0,
            ..RolloutConfig::default()
        }),
        ..exact_config(1)
    };
    assert!(matches!(
        Orchestrator::new(zero_horizon, chain_spec()),
        Err(SimulationError::InvalidConfig(_))
    ));

    let bad_probability = OrchestratorConfig {
        default_success_probability: 1.2,
        ..exact_config(1)
    };
    assert!(matches!(
        Orchestrator::new(bad_probability, chain_spec()),
        Err(SimulationError::InvalidConfig(_))
    ));
}

#[test]
fn test_event_log_records_dispatch_and_success() {
    let mut orchestrator = Orchestrator::new(exact_config(1), chain_spec()).unwrap();
    orchestrator.run().unwrap();
    let log = orchestrator.event_log();
    assert_eq!(log.events_of_type("dispatched").len(), 2);
    assert_eq!(log.events_of_type("repair_succeeded").len(), 2);
    assert_eq!(log.events_for_node("A").len(), 2);
}
