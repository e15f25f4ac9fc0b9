//! Rest detection: deciding which channel a freshly sampled snapshot goes on.
//!
//! Moving bodies stream over the lossy channel every send tick. Resting
//! bodies only send on state changes, over the reliable channel, so the
//! reliable channel is never flooded while rest state still converges on
//! every peer.

use crate::snapshot::{RestState, Snapshot, planar_distance};

/// Speed above which a body counts as moving.
pub const REST_SPEED_THRESHOLD: f32 = 50.0;

/// Planar drift from the stored rest pose that forces a fresh rest broadcast.
pub const REST_DRIFT_THRESHOLD: f32 = 50.0;

/// What to broadcast for one sampled snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RestDecision {
    /// Snapshot for the unreliable active-state channel.
    pub active: Option<Snapshot>,
    /// New rest state for the reliable channel. The blank rest state clears
    /// remote rest flags.
    pub rest: Option<RestState>,
}

impl RestDecision {
    /// Returns `true` if nothing needs sending.
    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.rest.is_none()
    }
}

/// Classifies `candidate` against the current rest state.
pub fn classify(candidate: &Snapshot, current_rest: &RestState, is_resting: bool) -> RestDecision {
    if candidate.speed() > REST_SPEED_THRESHOLD {
        RestDecision {
            active: Some(*candidate),
            rest: is_resting.then(RestState::blank),
        }
    } else {
        let drifted =
            planar_distance(current_rest.snapshot().position, candidate.position) > REST_DRIFT_THRESHOLD;
        RestDecision {
            active: None,
            rest: (!is_resting || drifted).then(|| RestState::from(*candidate)),
        }
    }
}
