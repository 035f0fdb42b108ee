//! Loop clock for the session driver.
//!
//! Mosh-style transports compute retransmission and send timers from a
//! "frozen" timestamp that only moves when the event loop says so. Instead
//! of a process-global, the driver owns a [`LoopClock`] and refreshes it
//! twice per iteration: once at the top, and once right after the blocking
//! wait. Every transport call in between receives the frozen instant, so
//! time spent blocked is accounted for exactly once.

use std::time::Instant;

/// Explicit clock snapshot owned by the driver loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopClock {
    frozen: Instant,
    freezes: u64,
}

impl Default for LoopClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            frozen: Instant::now(),
            freezes: 0,
        }
    }

    /// Take a new snapshot of the current time and return it.
    pub fn freeze(&mut self) -> Instant {
        self.frozen = Instant::now();
        self.freezes += 1;
        self.frozen
    }

    /// The frozen instant.
    pub fn now(&self) -> Instant {
        self.frozen
    }

    /// Number of snapshots taken so far.
    pub fn freezes(&self) -> u64 {
        self.freezes
    }
}
