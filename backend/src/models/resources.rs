//! Crew resource pool
//!
//! Pure arithmetic bookkeeping of crew commitments. The pool knows nothing
//! about repair semantics; the restoration state decides when a commitment
//! is made or released.
//!
//! # Critical Invariants
//!
//! 1. committed ≤ total at all times
//! 2. a commit never partially succeeds
//! 3. every commit is matched by exactly one release over a run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by crew bookkeeping
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Resource over-commit: {committed} crews committed but only {total} exist")]
    ResourceOverCommit { committed: u32, total: u32 },

    #[error("No crews committed to node {0}")]
    NotCommitted(String),
}

/// Tracks total crews and per-node commitments
///
/// # Example
/// ```
/// use repair_planner_core_rs::ResourcePool;
///
/// let mut pool = ResourcePool::new(2);
/// assert!(pool.try_commit("A", 1));
/// assert!(!pool.try_commit("B", 2)); // would exceed capacity
/// assert_eq!(pool.available_capacity(), 1);
///
/// assert_eq!(pool.release("A").unwrap(), 1);
/// assert_eq!(pool.available_capacity(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePool {
    total: u32,
    commitments: BTreeMap<String, u32>,
    committed: u32,
    commits: u64,
    releases: u64,
}

impl ResourcePool {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            commitments: BTreeMap::new(),
            committed: 0,
            commits: 0,
            releases: 0,
        }
    }

    /// Rebuild a pool from checkpointed commitments
    pub fn from_snapshot(
        total: u32,
        commitments: BTreeMap<String, u32>,
    ) -> Result<Self, ResourceError> {
        let committed =
            checked_total(&commitments).ok_or(ResourceError::ResourceOverCommit {
                committed: u32::MAX,
                total,
            })?;
        let pool = Self {
            total,
            commits: commitments.len() as u64,
            commitments,
            committed,
            releases: 0,
        };
        pool.check_invariants()?;
        Ok(pool)
    }

    pub fn total_capacity(&self) -> u32 {
        self.total
    }

    pub fn committed_capacity(&self) -> u32 {
        self.committed
    }

    pub fn available_capacity(&self) -> u32 {
        self.total.saturating_sub(self.committed)
    }

    /// Committed fraction of total capacity (0 when there are no crews)
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.committed as f64 / self.total as f64
        }
    }

    /// Crews committed to a node, if any
    pub fn committed_to(&self, node_id: &str) -> Option<u32> {
        self.commitments.get(node_id).copied()
    }

    pub fn commitments(&self) -> &BTreeMap<String, u32> {
        &self.commitments
    }

    /// Number of successful commits and releases so far
    pub fn commit_release_counts(&self) -> (u64, u64) {
        (self.commits, self.releases)
    }

    /// Atomically reserve `cost` crews for a node
    ///
    /// Refuses (returns false, changes nothing) when the cost is zero, the
    /// node already holds crews, or capacity is insufficient.
    pub fn try_commit(&mut self, node_id: &str, cost: u32) -> bool {
        if cost == 0 || self.commitments.contains_key(node_id) || cost > self.available_capacity()
        {
            return false;
        }
        self.commitments.insert(node_id.to_string(), cost);
        self.committed += cost;
        self.commits += 1;
        true
    }

    /// Return a node's crews to the pool; yields the released amount
    pub fn release(&mut self, node_id: &str) -> Result<u32, ResourceError> {
        let cost = self
            .commitments
            .remove(node_id)
            .ok_or_else(|| ResourceError::NotCommitted(node_id.to_string()))?;
        self.committed -= cost;
        self.releases += 1;
        Ok(cost)
    }

    /// Add crews (mutual-aid arrival)
    pub fn add_crews(&mut self, crews: u32) {
        self.total = self.total.saturating_add(crews);
    }

    /// Verify committed ≤ total and the running sum matches the map
    pub fn check_invariants(&self) -> Result<(), ResourceError> {
        let recomputed = checked_total(&self.commitments).unwrap_or(u32::MAX);
        if recomputed != self.committed || self.committed > self.total {
            return Err(ResourceError::ResourceOverCommit {
                committed: recomputed.max(self.committed),
                total: self.total,
            });
        }
        Ok(())
    }
}

/// Sum of commitments, or None if it does not fit in a u32
fn checked_total(commitments: &BTreeMap<String, u32>) -> Option<u32> {
    commitments
        .values()
        .try_fold(0u32, |acc, &cost| acc.checked_add(cost))
}
