//! Checkpoint save/load
//!
//! A snapshot captures everything needed to resume a run bit-for-bit: the
//! epoch, the RNG state, per-node repair progress, crew commitments and the
//! trajectory so far. The network topology and configuration are not stored;
//! instead a SHA-256 hash of both guards against resuming under different
//! inputs.
//!
//! # Critical Invariants
//!
//! 1. Snapshot node ids match the network exactly
//! 2. Commitments exist for exactly the InRepair nodes
//! 3. Committed crews never exceed total crews

use crate::models::network::Network;
use crate::models::node::{DamagedNode, RepairState};
use crate::orchestrator::engine::EpochRecord;
use crate::orchestrator::SimulationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Complete resumable run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Next epoch to execute
    pub current_epoch: usize,

    /// RNG state (not the original seed)
    pub rng_state: u64,

    pub nodes: Vec<NodeSnapshot>,

    pub total_crews: u32,

    pub commitments: BTreeMap<String, u32>,

    pub trajectory: Vec<EpochRecord>,

    pub repair_order: Vec<String>,

    /// SHA-256 of the canonical configuration and network description
    pub config_hash: String,
}

/// Mutable progress of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub state: RepairState,
    pub repair_time: f64,
    pub effort: f64,
    pub attempts: u32,
}

impl From<&DamagedNode> for NodeSnapshot {
    fn from(node: &DamagedNode) -> Self {
        NodeSnapshot {
            id: node.id().to_string(),
            state: node.state(),
            repair_time: node.repair_time(),
            effort: node.effort(),
            attempts: node.attempts(),
        }
    }
}

/// SHA-256 of a value's canonical JSON (object keys sorted)
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;

    let value = serde_json::to_value(config).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check a snapshot against the network it will be restored into
pub fn validate_snapshot(
    snapshot: &StateSnapshot,
    network: &Network,
) -> Result<(), SimulationError> {
    let fail = |msg: String| Err(SimulationError::Checkpoint(msg));

    let snapshot_ids: BTreeSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    if snapshot_ids.len() != snapshot.nodes.len() {
        return fail("Duplicate node in snapshot".to_string());
    }
    let network_ids: BTreeSet<&str> = network.nodes().map(|n| n.id()).collect();
    if snapshot_ids != network_ids {
        return fail("Snapshot nodes do not match the network".to_string());
    }

    for node in &snapshot.nodes {
        let committed = snapshot.commitments.contains_key(&node.id);
        let in_repair = node.state == RepairState::InRepair;
        if committed != in_repair {
            return fail(format!(
                "Node {} is {} but {} crews",
                node.id,
                node.state,
                if committed { "holds" } else { "holds no" }
            ));
        }
        if !(node.effort.is_finite() && node.effort >= 0.0) {
            return fail(format!("Node {} has invalid effort {}", node.id, node.effort));
        }
    }

    let committed: u64 = snapshot.commitments.values().map(|&c| u64::from(c)).sum();
    if committed > u64::from(snapshot.total_crews) {
        return fail(format!(
            "{} crews committed but only {} exist",
            committed, snapshot.total_crews
        ));
    }

    Ok(())
}
