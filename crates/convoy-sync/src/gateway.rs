//! Outbound side of the owner: the send timer and the two broadcast channels.
//!
//! The owner samples its body on a fixed send cadence (20 Hz by default),
//! independent of the frame rate. Active snapshots go out unreliably since a
//! lost one is superseded within one send period. Rest states go out reliably
//! because they are sent only on change.

use crate::rest::RestDecision;
use crate::snapshot::Snapshot;

/// Outbound channels for one body's state.
///
/// Implementations are fire-and-forget: a send that cannot be delivered is
/// simply lost.
pub trait Transport {
    /// Sends a moving snapshot. May be lost, duplicated or reordered.
    fn send_unreliable(&mut self, snapshot: &Snapshot);

    /// Sends a rest state. Delivered exactly once, in order.
    fn send_reliable(&mut self, snapshot: &Snapshot);
}

// ---------------------------------------------------------------------------
// SendTimer
// ---------------------------------------------------------------------------

/// Upper bound on sends fired by a single [`SendTimer::advance`], so a stalled
/// frame does not flood the transport with stale samples.
pub const MAX_SENDS_PER_ADVANCE: u32 = 4;

/// Repeating accumulator timer driving the owner's broadcasts.
#[derive(Debug, Clone, PartialEq)]
pub struct SendTimer {
    rate: f64,
    accumulator: f64,
    enabled: bool,
}

impl SendTimer {
    /// Creates a stopped timer firing every `rate` seconds.
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            accumulator: 0.0,
            enabled: false,
        }
    }

    /// Starts (or keeps) the timer running.
    pub fn start(&mut self) {
        self.enabled = true;
    }

    /// Stops the timer and discards accumulated time.
    pub fn stop(&mut self) {
        self.enabled = false;
        self.accumulator = 0.0;
    }

    /// Returns `true` if the timer is running.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Seconds between fires.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Adds `dt` seconds and returns how many periods elapsed.
    ///
    /// A stopped timer never fires. A non-positive rate fires once per call.
    pub fn advance(&mut self, dt: f64) -> u32 {
        if !self.enabled {
            return 0;
        }
        if self.rate <= 0.0 {
            return 1;
        }

        self.accumulator += dt.max(0.0);
        let mut fires = 0;
        while self.accumulator >= self.rate {
            self.accumulator -= self.rate;
            fires += 1;
        }

        if fires > MAX_SENDS_PER_ADVANCE {
            tracing::debug!(
                fires,
                max = MAX_SENDS_PER_ADVANCE,
                "send timer fell behind, skipping ticks"
            );
            fires = MAX_SENDS_PER_ADVANCE;
        }
        fires
    }
}

/// Puts a classifier decision on the wire. Returns the number of messages
/// sent.
pub fn broadcast(decision: &RestDecision, transport: &mut impl Transport) -> usize {
    let mut sent = 0;
    if let Some(active) = &decision.active {
        transport.send_unreliable(active);
        sent += 1;
    }
    if let Some(rest) = &decision.rest {
        transport.send_reliable(rest.snapshot());
        sent += 1;
    }
    sent
}
