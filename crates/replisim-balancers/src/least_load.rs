//! Least-load assignment.
//!
//! Sends each request to the replica with the shortest projected queue:
//! its current queue length plus whatever this same call has already
//! placed on it. Ties go to the replica registered first.

use crate::traits::*;

/// Least-load policy. Stateless between ticks.
pub struct LeastLoad;

impl LeastLoad {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LeastLoad {
    fn default() -> Self {
        Self::new()
    }
}

impl AssignmentPolicy for LeastLoad {
    fn assign(
        &mut self,
        traffic: &[TrafficInfo],
        replicas: &[ReplicaSnapshot],
    ) -> Result<Vec<usize>, BalanceError> {
        if replicas.is_empty() {
            return Err(BalanceError::NoReplicas);
        }

        let mut projected: Vec<usize> = replicas.iter().map(|r| r.queue_length).collect();
        let mut targets = Vec::with_capacity(traffic.len());
        for _ in traffic {
            // Keying on (load, position) makes the earliest registration win ties.
            let (best, _) = projected
                .iter()
                .enumerate()
                .min_by_key(|&(pos, &load)| (load, pos))
                .ok_or(BalanceError::NoReplicas)?;
            projected[best] += 1;
            targets.push(best);
        }
        Ok(targets)
    }

    fn name(&self) -> &str {
        "least_load"
    }
}
