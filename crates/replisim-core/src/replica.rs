//! Simulated compute replica with a FIFO queue and a per-tick budget.
//!
//! Each [`Replica`] spends its capacity strictly head-of-line: the oldest
//! request gets as much as it can use, the remainder flows to the next one,
//! and scanning stops once the budget is gone. It models one accelerator
//! working through a slab at a time, not time-slicing.

use crate::clock::Tick;
use crate::config::ConfigError;
use crate::ids::IdAllocator;
use crate::topology::{AcceleratorType, Region};
use crate::traffic::Traffic;
use replisim_balancers::ReplicaSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How a replica's capacity was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaKind {
    /// Capacity comes from the accelerator type.
    Accelerator(AcceleratorType),
    /// Capacity given directly in configuration.
    FixedCapacity,
}

impl ReplicaKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReplicaKind::Accelerator(_) => "accelerator",
            ReplicaKind::FixedCapacity => "fixed_capacity",
        }
    }
}

/// A simulated replica draining queued traffic.
#[derive(Debug)]
pub struct Replica {
    id: u64,
    kind: ReplicaKind,
    location: Region,
    /// Compute units per tick. Always positive.
    capacity: u64,
    /// Arrival order is processing priority.
    queue: VecDeque<Traffic>,
    // --- Counters ---
    total_completed: u64,
    total_expired: u64,
    busy_units: u64,
}

impl Replica {
    /// Create a replica. A zero capacity could never finish anything and is
    /// rejected.
    pub fn new(
        id: u64,
        kind: ReplicaKind,
        location: Region,
        capacity: u64,
    ) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::Validation(format!(
                "replica {} has zero capacity",
                id
            )));
        }
        Ok(Self {
            id,
            kind,
            location,
            capacity,
            queue: VecDeque::new(),
            total_completed: 0,
            total_expired: 0,
            busy_units: 0,
        })
    }

    /// Replica backed by an accelerator; capacity follows the hardware.
    pub fn accelerator(id: u64, location: Region, accelerator: AcceleratorType) -> Self {
        Self {
            id,
            kind: ReplicaKind::Accelerator(accelerator),
            location,
            capacity: accelerator.capacity(),
            queue: VecDeque::new(),
            total_completed: 0,
            total_expired: 0,
            busy_units: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ReplicaKind {
        self.kind
    }

    pub fn location(&self) -> Region {
        self.location
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    /// Ids of queued requests, head first.
    pub fn queued_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.queue.iter().map(Traffic::id)
    }

    /// Remaining compute of the queued request with `id`, if it is here.
    pub fn remaining_of(&self, id: u64) -> Option<u64> {
        self.queue
            .iter()
            .find(|t| t.id() == id)
            .map(Traffic::remaining_processing_time)
    }

    pub fn total_completed(&self) -> u64 {
        self.total_completed
    }

    pub fn total_expired(&self) -> u64 {
        self.total_expired
    }

    /// Compute units actually spent since the run started.
    pub fn busy_units(&self) -> u64 {
        self.busy_units
    }

    /// Advance one tick.
    ///
    /// Appends `incoming` behind everything already queued, spends the
    /// capacity head-of-line, and returns the requests that ran out of work,
    /// stamped with `tick` as their finish time, in queue order.
    pub fn step(&mut self, incoming: Vec<Traffic>, tick: Tick) -> Vec<Traffic> {
        self.queue.extend(incoming);

        let mut budget = self.capacity;
        for traffic in self.queue.iter_mut() {
            if budget == 0 {
                break;
            }
            budget -= traffic.apply_compute(budget);
        }
        self.busy_units += self.capacity - budget;

        let mut finished = self.drain_matching(|t| t.is_complete());
        for traffic in finished.iter_mut() {
            traffic.finish(tick);
        }
        self.total_completed += finished.len() as u64;
        finished
    }

    /// Remove every queued request for which `pred` returns true, keeping
    /// the rest in order. Removed requests come back in queue order.
    pub fn drain_matching<F>(&mut self, mut pred: F) -> Vec<Traffic>
    where
        F: FnMut(&mut Traffic) -> bool,
    {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.queue.len());
        for mut traffic in self.queue.drain(..) {
            if pred(&mut traffic) {
                taken.push(traffic);
            } else {
                kept.push_back(traffic);
            }
        }
        self.queue = kept;
        taken
    }

    /// Pull out every queued request whose deadline has passed at `tick`.
    pub fn take_expired(&mut self, tick: Tick) -> Vec<Traffic> {
        let expired = self.drain_matching(|t| t.check_expired(tick));
        self.total_expired += expired.len() as u64;
        expired
    }

    /// Read-only view for assignment policies.
    pub fn snapshot(&self) -> ReplicaSnapshot {
        ReplicaSnapshot {
            id: self.id,
            queue_length: self.queue.len(),
            capacity: self.capacity,
        }
    }

    /// Per-tick state written into the trace.
    pub fn info(&self) -> ReplicaInfo {
        ReplicaInfo {
            id: self.id,
            queue_length: self.queue.len(),
            queue: self.queued_ids().collect(),
            capacity: self.capacity,
            accelerator: match self.kind {
                ReplicaKind::Accelerator(acc) => Some(acc.as_str().to_string()),
                ReplicaKind::FixedCapacity => None,
            },
        }
    }

    /// Static description written once at the start of a run.
    pub fn meta_info(&self) -> ReplicaMeta {
        ReplicaMeta {
            id: self.id,
            name: self.kind.name().to_string(),
            location: self.location,
            capacity: self.capacity,
        }
    }
}

/// Per-tick replica state in the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaInfo {
    pub id: u64,
    pub queue_length: usize,
    pub queue: Vec<u64>,
    pub capacity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator: Option<String>,
}

/// Static replica description in the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaMeta {
    pub id: u64,
    pub name: String,
    pub location: Region,
    pub capacity: u64,
}

/// Build a replica from its configuration type name.
///
/// | Type | Capacity from |
/// |------|---------------|
/// | `accelerator` | `accelerator` (A100 = 10, T4 = 1) |
/// | `fixed_capacity` | `capacity` |
pub fn replica_by_name(
    type_name: &str,
    location: Region,
    accelerator: Option<&str>,
    capacity: Option<u64>,
    ids: &mut IdAllocator,
) -> Result<Replica, ConfigError> {
    match type_name {
        "accelerator" => {
            let name = accelerator.ok_or_else(|| {
                ConfigError::Validation("accelerator replica needs an `accelerator`".to_string())
            })?;
            let acc = AcceleratorType::from_name(name)?;
            Ok(Replica::accelerator(ids.next_id(), location, acc))
        }
        "fixed_capacity" => {
            let capacity = capacity.ok_or_else(|| {
                ConfigError::Validation("fixed_capacity replica needs a `capacity`".to_string())
            })?;
            Replica::new(ids.next_id(), ReplicaKind::FixedCapacity, location, capacity)
        }
        other => Err(ConfigError::UnknownReplicaType(other.to_string())),
    }
}

/// All replica type names accepted by [`replica_by_name`].
pub fn available_replica_types() -> Vec<&'static str> {
    vec!["accelerator", "fixed_capacity"]
}
