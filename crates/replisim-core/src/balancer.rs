//! The load balancer: registered replicas plus an assignment policy.
//!
//! The policy only picks target positions. The balancer turns those picks
//! into a partition that names every registered replica, moves each
//! request into exactly one bucket, and refuses anything that would drop
//! or duplicate traffic.

use crate::config::ConfigError;
use crate::error::SimError;
use crate::replica::{Replica, ReplicaInfo, ReplicaMeta};
use crate::traffic::Traffic;
use replisim_balancers::{self, validate_targets, AssignmentPolicy, ReplicaSnapshot, TrafficInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Traffic assigned this tick, one entry per registered replica in
/// registration order, keyed by replica id. Replicas that received nothing
/// still appear with an empty list.
pub type Assignment = Vec<(u64, Vec<Traffic>)>;

pub struct LoadBalancer {
    policy: Box<dyn AssignmentPolicy>,
    /// Append-only; order drives round-robin and trace ordering.
    replicas: Vec<Replica>,
}

impl LoadBalancer {
    pub fn new(policy: Box<dyn AssignmentPolicy>) -> Self {
        Self {
            policy,
            replicas: Vec::new(),
        }
    }

    /// Build a balancer from a policy's configuration name.
    pub fn by_name(name: &str) -> Result<Self, ConfigError> {
        replisim_balancers::policy_by_name(name)
            .map(Self::new)
            .ok_or_else(|| ConfigError::UnknownPolicy(name.to_string()))
    }

    pub fn register(&mut self, replica: Replica) {
        self.replicas.push(replica);
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    pub fn replicas_mut(&mut self) -> &mut [Replica] {
        &mut self.replicas
    }

    pub fn snapshots(&self) -> Vec<ReplicaSnapshot> {
        self.replicas.iter().map(Replica::snapshot).collect()
    }

    /// Partition `traffic` across the registered replicas.
    ///
    /// Reads only queue lengths; no queue is touched here.
    pub fn assign(&mut self, traffic: Vec<Traffic>) -> Result<Assignment, SimError> {
        let infos: Vec<TrafficInfo> = traffic.iter().map(Traffic::info).collect();
        let snapshots = self.snapshots();
        let targets = self.policy.assign(&infos, &snapshots)?;
        // A bad target list would drop or duplicate traffic.
        validate_targets(&targets, traffic.len(), snapshots.len()).map_err(|e| {
            SimError::InvariantViolation(format!("policy {}: {}", self.policy.name(), e))
        })?;

        let mut buckets: Vec<Vec<Traffic>> = (0..snapshots.len()).map(|_| Vec::new()).collect();
        for (item, position) in traffic.into_iter().zip(targets) {
            buckets[position].push(item);
        }

        Ok(snapshots
            .iter()
            .map(|s| s.id)
            .zip(buckets)
            .collect())
    }

    /// Check that no request id is queued on more than one replica.
    pub fn verify_exclusive_ownership(&self) -> Result<(), SimError> {
        let mut seen = HashSet::new();
        for replica in &self.replicas {
            for id in replica.queued_ids() {
                if !seen.insert(id) {
                    return Err(SimError::InvariantViolation(format!(
                        "traffic {} is queued on more than one replica (found again on replica {})",
                        id,
                        replica.id()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Static description written once at the start of a run.
    pub fn meta_info(&self) -> LbMeta {
        LbMeta {
            name: self.policy.name().to_string(),
            num_replicas: self.replicas.len(),
            replicas: self.replicas.iter().map(Replica::meta_info).collect(),
        }
    }

    /// Snapshot of replica queues and policy state, written every tick.
    pub fn info(&self) -> LbInfo {
        LbInfo {
            replicas: self.replicas.iter().map(Replica::info).collect(),
            policy_state: self.policy.policy_state(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbMeta {
    pub name: String,
    pub num_replicas: usize,
    pub replicas: Vec<ReplicaMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbInfo {
    pub replicas: Vec<ReplicaInfo>,
    #[serde(flatten)]
    pub policy_state: BTreeMap<String, u64>,
}
