//! Node state machine tests

use proptest::prelude::*;
use repair_planner_core_rs::{
    DamagedNode, DurationJitter, NodeError, RepairOutcome, RepairState, RngManager,
};

fn node(repair_time: f64) -> DamagedNode {
    DamagedNode::new("EPN-1".to_string(), 5.0, 300, repair_time)
}

#[test]
fn test_begin_repair_only_from_damaged() {
    let mut rng = RngManager::new(1);
    let mut n = node(2.0);
    n.begin_repair(&mut rng).unwrap();
    assert_eq!(n.state(), RepairState::InRepair);
    assert_eq!(n.attempts(), 1);

    let err = n.begin_repair(&mut rng).unwrap_err();
    assert_eq!(
        err,
        NodeError::InvalidStateTransition {
            node_id: "EPN-1".to_string(),
            from: RepairState::InRepair,
            action: "begin repair",
        }
    );
}

#[test]
fn test_advance_requires_in_repair() {
    let mut rng = RngManager::new(1);
    let mut n = node(2.0);
    assert!(matches!(
        n.advance_repair(1, &mut rng),
        Err(NodeError::InvalidStateTransition { from: RepairState::Damaged, .. })
    ));
}

#[test]
fn test_multi_epoch_repair() {
    let mut rng = RngManager::new(1);
    let mut n = node(3.0);
    n.begin_repair(&mut rng).unwrap();

    assert_eq!(
        n.advance_repair(1, &mut rng).unwrap(),
        RepairOutcome::InProgress {
            effort: 1.0,
            required: 3.0
        }
    );
    assert!(matches!(
        n.advance_repair(1, &mut rng).unwrap(),
        RepairOutcome::InProgress { .. }
    ));
    assert_eq!(
        n.advance_repair(1, &mut rng).unwrap(),
        RepairOutcome::Succeeded { attempts: 1 }
    );
    assert!(n.state().is_functioning());
}

#[test]
fn test_understaffed_repair_is_slower() {
    let mut rng = RngManager::new(1);
    let mut n = node(1.0).with_crew_cost(2);
    n.begin_repair(&mut rng).unwrap();

    // one of two crews: half an epoch of effort
    assert!(matches!(
        n.advance_repair(1, &mut rng).unwrap(),
        RepairOutcome::InProgress { .. }
    ));
    assert!((n.effort() - 0.5).abs() < 1e-12);
    assert_eq!(
        n.advance_repair(1, &mut rng).unwrap(),
        RepairOutcome::Succeeded { attempts: 1 }
    );
}

#[test]
fn test_overstaffing_is_capped() {
    let mut rng = RngManager::new(1);
    let mut n = node(2.0);
    n.begin_repair(&mut rng).unwrap();
    n.advance_repair(5, &mut rng).unwrap();
    assert!((n.effort() - 1.0).abs() < 1e-12);
}

#[test]
fn test_zero_probability_never_succeeds() {
    let mut rng = RngManager::new(17);
    let mut n = node(1.0).with_success_probability(0.0);
    n.begin_repair(&mut rng).unwrap();

    for attempt in 1..=20 {
        let outcome = n.advance_repair(1, &mut rng).unwrap();
        assert_eq!(outcome, RepairOutcome::Failed { attempts: attempt });
        assert_eq!(n.state(), RepairState::InRepair);
        assert_eq!(n.effort(), 0.0);
    }
    assert_eq!(n.attempts(), 21);
}

#[test]
fn test_failed_attempt_resamples_duration() {
    let mut rng = RngManager::new(5);
    let mut n = node(10.0)
        .with_success_probability(0.0)
        .with_duration_jitter(Some(DurationJitter::new(0.8, 1.5)));
    n.begin_repair(&mut rng).unwrap();
    let mut durations = vec![n.repair_time()];
    for _ in 0..5 {
        while matches!(
            n.advance_repair(1, &mut rng).unwrap(),
            RepairOutcome::InProgress { .. }
        ) {}
        durations.push(n.repair_time());
    }
    for d in &durations {
        assert!((8.0..=15.0).contains(d), "duration {} outside jitter", d);
    }
    assert!(durations.windows(2).any(|w| w[0] != w[1]));
}

#[test]
fn test_redamage_transitions() {
    let mut rng = RngManager::new(1);
    let mut n = node(1.0);
    assert!(n.redamage().is_err(), "already Damaged");

    n.begin_repair(&mut rng).unwrap();
    assert_eq!(n.redamage().unwrap(), RepairState::InRepair);
    assert_eq!(n.state(), RepairState::Damaged);

    n.begin_repair(&mut rng).unwrap();
    n.advance_repair(1, &mut rng).unwrap();
    assert_eq!(n.redamage().unwrap(), RepairState::Repaired);
}

#[test]
fn test_mark_damaged_only_from_operational() {
    let mut n = node(1.0).with_state(RepairState::Operational);
    n.mark_damaged().unwrap();
    assert_eq!(n.state(), RepairState::Damaged);
    assert!(n.mark_damaged().is_err());

    let mut repaired = node(1.0).with_state(RepairState::Repaired);
    assert!(repaired.mark_damaged().is_err());
}

#[test]
fn test_priority_score_guards_zero_repair_time() {
    let n = node(0.0);
    assert!(n.priority_score().is_finite());
    assert!(n.priority_score() > 0.0);
}

proptest! {
    #[test]
    fn prop_state_machine_stays_consistent(
        seed in 1u64..u64::MAX,
        probability in 0.0f64..=1.0,
        repair_time in 0.0f64..5.0,
        crew_cost in 1u32..4,
        committed in prop::collection::vec(1u32..5, 1..40),
    ) {
        let mut rng = RngManager::new(seed);
        let mut n = node(repair_time)
            .with_success_probability(probability)
            .with_crew_cost(crew_cost);
        n.begin_repair(&mut rng).unwrap();

        for crews in committed {
            if n.state() == RepairState::Repaired {
                prop_assert!(n.advance_repair(crews, &mut rng).is_err());
                break;
            }
            let before = n.attempts();
            match n.advance_repair(crews, &mut rng).unwrap() {
                RepairOutcome::InProgress { effort, required } => {
                    prop_assert!(effort < required);
                    prop_assert_eq!(n.attempts(), before);
                }
                RepairOutcome::Succeeded { attempts } => {
                    prop_assert_eq!(attempts, before);
                    prop_assert_eq!(n.state(), RepairState::Repaired);
                }
                RepairOutcome::Failed { attempts } => {
                    prop_assert_eq!(attempts, before);
                    prop_assert_eq!(n.attempts(), before + 1);
                    prop_assert_eq!(n.state(), RepairState::InRepair);
                    prop_assert_eq!(n.effort(), 0.0);
                }
            }
        }
    }
}
