//! Assignment policy trait definitions.
//!
//! Every policy implements [`AssignmentPolicy`]: given the traffic that
//! arrived this tick and a read-only view of the registered replicas, it
//! picks a target replica for each item. Policies never mutate traffic or
//! replica queues; the simulator applies the decision.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Read-only snapshot of a replica, provided to assignment policies.
///
/// Snapshots are passed in registration order. Policies refer to replicas
/// by their position in that slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSnapshot {
    pub id: u64,
    /// Number of requests currently waiting in the replica's queue.
    pub queue_length: usize,
    /// Compute units the replica can spend per tick.
    pub capacity: u64,
}

/// The part of an incoming request that policies are allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficInfo {
    pub id: u64,
    pub execution_time: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("no replicas registered with the load balancer")]
    NoReplicas,
    #[error("policy chose replica position {position}, but only {replicas} replicas are registered")]
    TargetOutOfRange { position: usize, replicas: usize },
    #[error("policy returned {got} targets for {expected} traffic items")]
    WrongLength { expected: usize, got: usize },
}

/// The core assignment policy trait.
///
/// [`assign`](AssignmentPolicy::assign) returns one replica position per
/// incoming item, in input order. The simulator turns that into a
/// per-replica partition and checks it.
pub trait AssignmentPolicy: Send + Sync {
    fn assign(
        &mut self,
        traffic: &[TrafficInfo],
        replicas: &[ReplicaSnapshot],
    ) -> Result<Vec<usize>, BalanceError>;

    /// Name used in configuration files and reports.
    fn name(&self) -> &str;

    /// Policy-specific state included in each tick's trace record.
    fn policy_state(&self) -> BTreeMap<String, u64> {
        BTreeMap::new()
    }
}

/// Check that a policy's answer covers every item and stays in range.
pub fn validate_targets(
    targets: &[usize],
    traffic_len: usize,
    replica_len: usize,
) -> Result<(), BalanceError> {
    if targets.len() != traffic_len {
        return Err(BalanceError::WrongLength {
            expected: traffic_len,
            got: targets.len(),
        });
    }
    if let Some(&position) = targets.iter().find(|&&p| p >= replica_len) {
        return Err(BalanceError::TargetOutOfRange {
            position,
            replicas: replica_len,
        });
    }
    Ok(())
}
