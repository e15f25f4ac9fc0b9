//! Fixed-timestep stepping driven by explicit frame times.
//!
//! Frames of any length feed an accumulator that is drained in fixed
//! updates, so the sync pipeline always sees the same `dt` regardless of how
//! irregular the frames were.

use tracing::warn;

/// Maximum frame time clamp to prevent a spiral of death.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Accumulator that turns frame times into fixed updates.
#[derive(Debug, Clone)]
pub struct FixedStepper {
    dt: f64,
    accumulator: f64,
    total_sim_time: f64,
    frame_count: u64,
    update_count: u64,
}

impl FixedStepper {
    /// Creates a stepper running `rate` updates per second.
    pub fn new(rate: u32) -> Self {
        Self {
            dt: 1.0 / f64::from(rate.max(1)),
            accumulator: 0.0,
            total_sim_time: 0.0,
            frame_count: 0,
            update_count: 0,
        }
    }

    /// Fixed update length in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Feeds one frame of `frame_time` seconds. `update_fn(dt, sim_time)` is
    /// called zero or more times; `sim_time` is the time at the start of the
    /// update. Returns the number of updates run.
    pub fn tick(&mut self, frame_time: f64, mut update_fn: impl FnMut(f64, f64)) -> u32 {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }

        self.accumulator += frame_time;

        let mut updates = 0;
        while self.accumulator >= self.dt {
            update_fn(self.dt, self.total_sim_time);
            self.total_sim_time += self.dt;
            self.accumulator -= self.dt;
            self.update_count += 1;
            updates += 1;
        }

        self.frame_count += 1;
        updates
    }

    /// Fraction of a fixed update left in the accumulator, in `[0, 1)`.
    pub fn alpha(&self) -> f64 {
        if self.accumulator > 0.0 {
            self.accumulator / self.dt
        } else {
            0.0
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Total simulated time in seconds.
    pub fn total_sim_time(&self) -> f64 {
        self.total_sim_time
    }
}
