//! Tick clock for the simulation loop.
//!
//! The [`SimClock`] is the only source of simulated time. The engine owns
//! it and is the only caller of [`SimClock::advance`]; everything else
//! receives tick values by read.

/// Discrete simulation time.
pub type Tick = u64;

/// Monotonic tick counter.
///
/// A fresh clock has not started yet: the first [`advance`](Self::advance)
/// yields tick 0.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    tick: Option<Tick>,
}

impl SimClock {
    /// Create a clock that has not started.
    pub fn new() -> Self {
        Self { tick: None }
    }

    /// Move to the next tick and return it.
    pub fn advance(&mut self) -> Tick {
        let next = match self.tick {
            Some(t) => t + 1,
            None => 0,
        };
        self.tick = Some(next);
        next
    }

    /// Current tick.
    ///
    /// # Panics
    ///
    /// Panics if the clock has never been advanced.
    pub fn current(&self) -> Tick {
        match self.tick {
            Some(t) => t,
            None => panic!("Clock read before the first advance"),
        }
    }

    /// Whether the clock has been advanced at least once.
    pub fn has_started(&self) -> bool {
        self.tick.is_some()
    }
}
