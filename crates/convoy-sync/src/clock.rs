//! Local time sources.
//!
//! Clocks are never synchronized between peers. Sender timestamps are only
//! ever compared with each other (as deltas), never with the receiver's
//! clock.

use std::cell::Cell;
use std::time::Instant;

/// A monotonically increasing local time source, in seconds.
pub trait Clock {
    /// Seconds since this clock's epoch.
    fn now(&self) -> f64;
}

/// Wall-clock time since construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    /// Starts a clock at zero.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// A clock advanced by hand, for deterministic tests and simulation.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    pub fn new(start: f64) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Moves the clock forward. Negative steps are ignored.
    pub fn advance(&self, dt: f64) {
        if dt > 0.0 {
            self.now.set(self.now.get() + dt);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}
