//! Round-robin assignment.
//!
//! Cycles through the registered replicas in registration order, one
//! incoming request per step, ignoring replica load entirely.

use crate::traits::*;
use std::collections::BTreeMap;

/// Round-robin policy.
///
/// The cursor is a position in the registration order and survives across
/// ticks, so a burst split over two ticks continues where the previous one
/// stopped.
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Position the next request will be sent to.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl AssignmentPolicy for RoundRobin {
    fn assign(
        &mut self,
        traffic: &[TrafficInfo],
        replicas: &[ReplicaSnapshot],
    ) -> Result<Vec<usize>, BalanceError> {
        if replicas.is_empty() {
            return Err(BalanceError::NoReplicas);
        }
        // The replica set can only grow; the cursor must stay in range.
        self.cursor %= replicas.len();

        let mut targets = Vec::with_capacity(traffic.len());
        for _ in traffic {
            targets.push(self.cursor);
            self.cursor = (self.cursor + 1) % replicas.len();
        }
        Ok(targets)
    }

    fn name(&self) -> &str {
        "round_robin"
    }

    fn policy_state(&self) -> BTreeMap<String, u64> {
        BTreeMap::from([("idx".to_string(), self.cursor as u64)])
    }
}
