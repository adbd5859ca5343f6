//! Network state model
//!
//! Holds the undirected graph of repairable elements and derives the service
//! metric from node states on demand.
//!
//! # Critical Invariants
//!
//! 1. **Referential integrity**: every edge joins two existing nodes
//! 2. **Fresh metrics**: the service metric is recomputed from node states
//!    and edges on every call, never cached
//! 3. **Deterministic iteration**: nodes are visited in id order

use crate::models::node::{DamagedNode, DurationJitter, NodeError, RepairState};
use crate::rng::RngManager;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use thiserror::Error;
use tracing::debug;

/// Importance ceiling used by the residual cost-to-go estimate
const IMPORTANCE_CEILING: f64 = 10.0;

/// Cost-to-go penalty for each failed neighbour of a failed node
const ADJACENT_DAMAGE_PENALTY: f64 = 5.0;

/// Errors raised while building a network from its description
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TopologyError {
    #[error("Edge references unknown node {0}")]
    UnknownNode(String),

    #[error("Duplicate node id {0}")]
    DuplicateNode(String),

    #[error("Duplicate edge {0} -- {1}")]
    DuplicateEdge(String, String),

    #[error("Self loop on node {0}")]
    SelfLoop(String),

    #[error("Node {node_id} has invalid attribute: {reason}")]
    InvalidNode { node_id: String, reason: String },

    #[error("Network has no nodes")]
    EmptyNetwork,
}

/// Per-node description supplied by an external loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub importance: f64,
    pub population_served: u64,
    pub repair_time: f64,
    #[serde(default = "default_initial_state")]
    pub initial_state: RepairState,
    #[serde(default)]
    pub success_probability: Option<f64>,
    #[serde(default)]
    pub crew_cost: Option<u32>,
    #[serde(default)]
    pub is_source: bool,
}

fn default_initial_state() -> RepairState {
    RepairState::Damaged
}

/// Topology plus initial damage assessment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<(String, String)>,
}

/// Values applied to nodes whose spec leaves them unset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeDefaults {
    pub success_probability: f64,
    pub crew_cost: u32,
    pub duration_jitter: Option<DurationJitter>,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            success_probability: 1.0,
            crew_cost: 1,
            duration_jitter: None,
        }
    }
}

/// Cascading damage parameters
///
/// During the first `active_epochs` epochs, each failed neighbour of an
/// Operational node independently spreads damage with probability
/// `probability × decay^epoch`. Repaired nodes are hardened and never
/// fail through propagation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub probability: f64,
    pub decay: f64,
    pub active_epochs: usize,
}

impl PropagationConfig {
    /// No cascading damage at all
    pub fn disabled() -> Self {
        Self {
            probability: 0.0,
            decay: 1.0,
            active_epochs: 0,
        }
    }

    /// Per-edge spread probability at `epoch` (0 outside the active phase)
    pub fn edge_probability(&self, epoch: usize) -> f64 {
        if epoch >= self.active_epochs {
            return 0.0;
        }
        (self.probability * self.decay.powi(epoch as i32)).clamp(0.0, 1.0)
    }
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            probability: 0.2,
            decay: 0.5,
            active_epochs: 3,
        }
    }
}

/// Power distribution network under restoration
///
/// # Example
/// ```
/// use repair_planner_core_rs::{DamagedNode, Network, RepairState};
///
/// let mut network = Network::new();
/// network
///     .add_node(DamagedNode::new("SUB".to_string(), 0.0, 0, 0.0)
///         .with_state(RepairState::Operational)
///         .as_source())
///     .unwrap();
/// network.add_node(DamagedNode::new("A".to_string(), 5.0, 100, 2.0)).unwrap();
/// network.add_edge("SUB", "A").unwrap();
///
/// assert_eq!(network.get_damaged_nodes(), vec!["A".to_string()]);
/// assert_eq!(network.compute_service_metric(), 0.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Network {
    graph: UnGraph<DamagedNode, ()>,
    index: BTreeMap<String, NodeIndex>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a network from a loader-supplied description
    ///
    /// All topology problems surface here, before any epoch runs.
    pub fn from_spec(spec: &NetworkSpec, defaults: &NodeDefaults) -> Result<Self, TopologyError> {
        if spec.nodes.is_empty() {
            return Err(TopologyError::EmptyNetwork);
        }

        let mut network = Network::new();
        for node_spec in &spec.nodes {
            network.add_node(build_node(node_spec, defaults)?)?;
        }
        for (a, b) in &spec.edges {
            network.add_edge(a, b)?;
        }
        Ok(network)
    }

    /// Add a node; ids must be unique
    pub fn add_node(&mut self, node: DamagedNode) -> Result<(), TopologyError> {
        if self.index.contains_key(node.id()) {
            return Err(TopologyError::DuplicateNode(node.id().to_string()));
        }
        let id = node.id().to_string();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        Ok(())
    }

    /// Connect two existing nodes
    pub fn add_edge(&mut self, a: &str, b: &str) -> Result<(), TopologyError> {
        let ia = self.node_index(a)?;
        let ib = self.node_index(b)?;
        if ia == ib {
            return Err(TopologyError::SelfLoop(a.to_string()));
        }
        if self.graph.find_edge(ia, ib).is_some() {
            return Err(TopologyError::DuplicateEdge(a.to_string(), b.to_string()));
        }
        self.graph.add_edge(ia, ib, ());
        Ok(())
    }

    fn node_index(&self, id: &str) -> Result<NodeIndex, TopologyError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| TopologyError::UnknownNode(id.to_string()))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn node(&self, id: &str) -> Option<&DamagedNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut DamagedNode> {
        match self.index.get(id) {
            Some(&idx) => Some(&mut self.graph[idx]),
            None => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &DamagedNode> + '_ {
        self.index.values().map(move |&idx| &self.graph[idx])
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Neighbour ids of a node, sorted
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self
            .graph
            .neighbors(idx)
            .map(|n| self.graph[n].id())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of Damaged or InRepair nodes, sorted
    pub fn get_damaged_nodes(&self) -> Vec<String> {
        self.nodes()
            .filter(|n| n.state().is_failed())
            .map(|n| n.id().to_string())
            .collect()
    }

    /// Ids of Damaged nodes that can take a crew, sorted
    pub fn dispatchable_nodes(&self) -> Vec<String> {
        self.nodes_in_state(RepairState::Damaged)
    }

    pub fn nodes_in_state(&self, state: RepairState) -> Vec<String> {
        self.nodes()
            .filter(|n| n.state() == state)
            .map(|n| n.id().to_string())
            .collect()
    }

    /// True when no node is Damaged or InRepair
    pub fn all_restored(&self) -> bool {
        self.nodes().all(|n| n.state().is_functioning())
    }

    pub fn total_population(&self) -> u64 {
        self.nodes().map(|n| n.population_served()).sum()
    }

    /// Population reachable from a functioning source through functioning nodes
    ///
    /// Breadth-first search seeded with every functioning source. A repaired
    /// node with no functioning path to a source is not served.
    pub fn served_population(&self) -> u64 {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = self
            .index
            .values()
            .copied()
            .filter(|&idx| {
                let node = &self.graph[idx];
                node.is_source() && node.state().is_functioning()
            })
            .collect();

        let mut served = 0;
        while let Some(idx) = queue.pop_front() {
            if !visited.insert(idx) {
                continue;
            }
            served += self.graph[idx].population_served();
            for neighbor in self.graph.neighbors(idx) {
                if !visited.contains(&neighbor) && self.graph[neighbor].state().is_functioning() {
                    queue.push_back(neighbor);
                }
            }
        }
        served
    }

    /// Fraction of population with a functioning path to a source, in [0, 1]
    ///
    /// A network serving nobody (total population 0) reports 1.0.
    pub fn compute_service_metric(&self) -> f64 {
        let total = self.total_population();
        if total == 0 {
            return 1.0;
        }
        self.served_population() as f64 / total as f64
    }

    /// Residual damage estimate used as an approximate cost-to-go
    ///
    /// Each failed node contributes its remaining repair time weighted by how
    /// far its importance sits below the ceiling, plus a fixed penalty per
    /// failed neighbour.
    pub fn cost_to_go(&self) -> f64 {
        let mut total = 0.0;
        for node in self.nodes().filter(|n| n.state().is_failed()) {
            let remaining = match node.state() {
                RepairState::InRepair => node.remaining_repair_time(),
                _ => node.base_repair_time(),
            };
            total += remaining * (IMPORTANCE_CEILING - node.importance()).max(0.0);

            let failed_neighbors = self
                .neighbors(node.id())
                .into_iter()
                .filter(|id| self.node(id).is_some_and(|n| n.state().is_failed()))
                .count();
            total += ADJACENT_DAMAGE_PENALTY * failed_neighbors as f64;
        }
        total
    }

    // ========================================================================
    // Stochastic transitions
    // ========================================================================

    /// Spread damage from failed nodes to Operational neighbours
    ///
    /// Draws are made against the states at the start of the call, so damage
    /// never chains within a single epoch. Returns the newly damaged ids.
    pub fn apply_damage_propagation(
        &mut self,
        step: usize,
        config: &PropagationConfig,
        rng: &mut RngManager,
    ) -> Vec<String> {
        let p = config.edge_probability(step);
        if p <= 0.0 {
            return Vec::new();
        }

        let failed: BTreeSet<NodeIndex> = self
            .index
            .values()
            .copied()
            .filter(|&idx| self.graph[idx].state().is_failed())
            .collect();

        let mut newly_damaged = Vec::new();
        for (id, &idx) in &self.index {
            if self.graph[idx].state() != RepairState::Operational {
                continue;
            }
            let failed_neighbors = self
                .graph
                .neighbors(idx)
                .filter(|n| failed.contains(n))
                .count();
            if failed_neighbors == 0 {
                continue;
            }
            let p_fail = 1.0 - (1.0 - p).powi(failed_neighbors as i32);
            if rng.chance(p_fail) {
                newly_damaged.push((id.clone(), idx));
            }
        }

        let mut ids = Vec::with_capacity(newly_damaged.len());
        for (id, idx) in newly_damaged {
            // Only Operational nodes were collected, so this cannot fail
            if self.graph[idx].mark_damaged().is_ok() {
                debug!(epoch = step, node_id = %id, "damage propagated");
                ids.push(id);
            }
        }
        ids
    }

    /// Explicit re-damage of a node (scenario event)
    pub fn redamage(&mut self, id: &str) -> Result<Option<RepairState>, NodeError> {
        match self.node_mut(id) {
            Some(node) => node.redamage().map(Some),
            None => Ok(None),
        }
    }
}

fn build_node(spec: &NodeSpec, defaults: &NodeDefaults) -> Result<DamagedNode, TopologyError> {
    let invalid = |reason: &str| TopologyError::InvalidNode {
        node_id: spec.id.clone(),
        reason: reason.to_string(),
    };

    if !(spec.importance.is_finite() && spec.importance >= 0.0) {
        return Err(invalid("importance must be non-negative"));
    }
    if !(spec.repair_time.is_finite() && spec.repair_time >= 0.0) {
        return Err(invalid("repair_time must be non-negative"));
    }
    if spec.initial_state == RepairState::InRepair {
        return Err(invalid("initial state cannot be InRepair"));
    }
    let probability = spec
        .success_probability
        .unwrap_or(defaults.success_probability);
    if !(0.0..=1.0).contains(&probability) {
        return Err(invalid("success_probability must be in [0, 1]"));
    }
    let crew_cost = spec.crew_cost.unwrap_or(defaults.crew_cost);
    if crew_cost == 0 {
        return Err(invalid("crew_cost must be positive"));
    }

    let mut node = DamagedNode::new(
        spec.id.clone(),
        spec.importance,
        spec.population_served,
        spec.repair_time,
    )
    .with_success_probability(probability)
    .with_crew_cost(crew_cost)
    .with_state(spec.initial_state)
    .with_duration_jitter(defaults.duration_jitter);
    if spec.is_source {
        node = node.as_source();
    }
    Ok(node)
}
