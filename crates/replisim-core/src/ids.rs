//! Per-run identifier allocation.

/// Hands out monotonically increasing ids, starting at 1.
///
/// Each simulation run owns its own allocators (one for traffic, one for
/// replicas, one for clients), so parallel runs never share a sequence.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id. Ids are never reused.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next - 1
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
