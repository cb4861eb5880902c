//! Request model.
//!
//! A [`Traffic`] is one unit of work. It is created by an arrival source
//! with a fixed execution time, stamped once at admission, drained by the
//! replica that owns it, and leaves the system either finished or expired.
//! Traffic is deliberately not `Clone`: a request lives in exactly one
//! place at a time, and replaying a template means constructing a new one.

use crate::clock::Tick;
use crate::ids::IdAllocator;
use crate::topology::Region;
use replisim_balancers::TrafficInfo;
use serde::{Deserialize, Serialize};

/// A single simulated request.
#[derive(Debug)]
pub struct Traffic {
    id: u64,
    execution_time: u64,
    remaining_processing_time: u64,
    start_time: Option<Tick>,
    finish_time: Option<Tick>,
    /// Deadline window, counted from `start_time`.
    expired_time: Option<u64>,
    expired: bool,
    origin_location: Option<Region>,
    admitted: bool,
}

impl Traffic {
    /// Create a request needing `execution_time` compute units.
    pub fn new(ids: &mut IdAllocator, execution_time: u64) -> Self {
        Self {
            id: ids.next_id(),
            execution_time,
            remaining_processing_time: execution_time,
            start_time: None,
            finish_time: None,
            expired_time: None,
            expired: false,
            origin_location: None,
            admitted: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn execution_time(&self) -> u64 {
        self.execution_time
    }

    pub fn remaining_processing_time(&self) -> u64 {
        self.remaining_processing_time
    }

    pub fn start_time(&self) -> Option<Tick> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<Tick> {
        self.finish_time
    }

    pub fn expired_time(&self) -> Option<u64> {
        self.expired_time
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn origin_location(&self) -> Option<Region> {
        self.origin_location
    }

    /// Record the moment the request entered the system.
    ///
    /// # Panics
    ///
    /// Panics if the request was already admitted.
    pub fn stamp_admission(
        &mut self,
        tick: Tick,
        expired_time: Option<u64>,
        origin_location: Option<Region>,
    ) {
        assert!(
            !self.admitted,
            "Traffic {} admitted twice (first at tick {:?}, again at {})",
            self.id, self.start_time, tick,
        );
        self.admitted = true;
        self.start_time = Some(tick);
        self.expired_time = expired_time;
        self.origin_location = origin_location;
    }

    /// Spend up to `units` of compute on this request.
    ///
    /// Returns how much was actually consumed, which is never more than
    /// what was still remaining.
    pub fn apply_compute(&mut self, units: u64) -> u64 {
        let consumed = units.min(self.remaining_processing_time);
        self.remaining_processing_time -= consumed;
        consumed
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_processing_time == 0
    }

    /// Whether the deadline has passed at `current_tick`.
    ///
    /// Latches: once this returns true the request stays expired.
    pub fn check_expired(&mut self, current_tick: Tick) -> bool {
        if self.expired {
            return true;
        }
        if let (Some(start), Some(window)) = (self.start_time, self.expired_time) {
            if current_tick >= start + window {
                self.expired = true;
            }
        }
        self.expired
    }

    /// Mark the request finished at `tick`.
    ///
    /// # Panics
    ///
    /// Panics if compute remains or the request already finished.
    pub fn finish(&mut self, tick: Tick) {
        assert!(
            self.is_complete(),
            "Traffic {} finished with {} units remaining",
            self.id,
            self.remaining_processing_time,
        );
        assert!(
            self.finish_time.is_none(),
            "Traffic {} finished twice",
            self.id
        );
        self.finish_time = Some(tick);
    }

    /// Ticks between admission and completion. Absent for expired or
    /// still-running requests.
    pub fn latency(&self) -> Option<u64> {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(finish)) => Some(finish.saturating_sub(start)),
            _ => None,
        }
    }

    /// The view assignment policies get.
    pub fn info(&self) -> TrafficInfo {
        TrafficInfo {
            id: self.id,
            execution_time: self.execution_time,
        }
    }

    /// Static description written to the trace when the request arrives.
    pub fn meta_info(&self) -> TrafficMeta {
        TrafficMeta {
            id: self.id,
            execution_time: self.execution_time,
            start_time: self.start_time,
            expired_time: self.expired_time,
            client_location: self.origin_location,
        }
    }
}

/// Trace-facing description of a newly observed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficMeta {
    pub id: u64,
    pub execution_time: u64,
    pub start_time: Option<Tick>,
    pub expired_time: Option<u64>,
    pub client_location: Option<Region>,
}
