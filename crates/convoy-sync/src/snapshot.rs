//! Timestamped pose/velocity samples and the retained rest state.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A timestamped sample of a body's pose and velocities.
///
/// `timestamp` is on the sender's clock when the snapshot is created. Once a
/// snapshot is accepted into a [`ReorderQueue`](crate::ReorderQueue) it holds
/// the sender time shifted by the playback delay. `local_timestamp` is the
/// receiver's rescheduled playback time and never goes over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Seconds on the sender's local clock.
    pub timestamp: f64,
    /// Receiver-side playback time. Not transmitted.
    #[serde(skip)]
    pub local_timestamp: f64,
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub rotation: Quat,
    /// Linear velocity in engine units per second.
    pub linear_velocity: Vec3,
    /// Angular velocity in radians per second.
    pub angular_velocity: Vec3,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            local_timestamp: 0.0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

impl Snapshot {
    /// Creates a motionless snapshot at `position`.
    pub fn at(timestamp: f64, position: Vec3, rotation: Quat) -> Self {
        Self {
            timestamp,
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Returns this snapshot with the given velocities.
    pub fn with_velocity(mut self, linear: Vec3, angular: Vec3) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    /// Returns `true` if the sent fields hold no NaN or infinity.
    /// `local_timestamp` is receiver-side and not checked.
    pub fn is_finite(&self) -> bool {
        self.timestamp.is_finite()
            && self.position.is_finite()
            && self.rotation.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
    }

    /// Speed (magnitude of the linear velocity).
    pub fn speed(&self) -> f32 {
        self.linear_velocity.length()
    }

    /// Returns `true` if every axis of the two positions differs by at most
    /// `tolerance`.
    pub fn position_nearly_equal(&self, other: &Snapshot, tolerance: f32) -> bool {
        let delta = (self.position - other.position).abs();
        delta.x <= tolerance && delta.y <= tolerance && delta.z <= tolerance
    }
}

/// Distance between two points ignoring height (the Z axis is up).
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    a.truncate().distance(b.truncate())
}

// ---------------------------------------------------------------------------
// RestState
// ---------------------------------------------------------------------------

/// The last known at-rest pose of a body, replicated reliably.
///
/// The default value (position at the origin) means the body has never been
/// classified as resting, or that a previous rest has been cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RestState(pub Snapshot);

impl RestState {
    /// The blank rest state broadcast when a resting body starts moving.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Whether this rest state marks the body as resting.
    pub fn is_resting(&self) -> bool {
        self.0.position != Vec3::ZERO
    }

    /// The retained snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.0
    }
}

impl From<Snapshot> for RestState {
    fn from(snapshot: Snapshot) -> Self {
        Self(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rest_state_is_not_resting() {
        assert!(!RestState::default().is_resting());
        assert!(!RestState::blank().is_resting());
    }

    #[test]
    fn test_rest_state_away_from_origin_is_resting() {
        let rest = RestState::from(Snapshot::at(1.0, Vec3::new(5.0, 0.0, 0.0), Quat::IDENTITY));
        assert!(rest.is_resting());
    }

    #[test]
    fn test_planar_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 1000.0);
        assert!((planar_distance(a, b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_position_nearly_equal_is_per_axis() {
        let a = Snapshot::at(0.0, Vec3::new(1.0, 1.0, 1.0), Quat::IDENTITY);
        let b = Snapshot::at(0.0, Vec3::new(1.05, 0.95, 1.09), Quat::IDENTITY);
        let c = Snapshot::at(0.0, Vec3::new(1.05, 0.95, 1.2), Quat::IDENTITY);
        assert!(a.position_nearly_equal(&b, 0.1));
        assert!(!a.position_nearly_equal(&c, 0.1));
    }

    #[test]
    fn test_non_finite_fields_are_detected() {
        let valid = Snapshot::at(1.0, Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        assert!(valid.is_finite());

        assert!(!Snapshot::at(f64::NAN, Vec3::ONE, Quat::IDENTITY).is_finite());
        assert!(!Snapshot::at(f64::INFINITY, Vec3::ONE, Quat::IDENTITY).is_finite());
        assert!(!Snapshot::at(1.0, Vec3::new(f32::NAN, 0.0, 0.0), Quat::IDENTITY).is_finite());
        assert!(!valid.with_velocity(Vec3::new(0.0, f32::INFINITY, 0.0), Vec3::ZERO).is_finite());
        assert!(!valid.with_velocity(Vec3::ZERO, Vec3::splat(f32::NAN)).is_finite());

        let mut rotated = valid;
        rotated.rotation = Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0);
        assert!(!rotated.is_finite());

        let mut scheduled = valid;
        scheduled.local_timestamp = f64::NAN;
        assert!(scheduled.is_finite());
    }

    #[test]
    fn test_local_timestamp_is_not_serialized() {
        let mut snapshot = Snapshot::at(2.5, Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        snapshot.local_timestamp = 99.0;
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("local_timestamp"));
        let decoded: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.local_timestamp, 0.0);
        assert_eq!(decoded.timestamp, 2.5);
        assert_eq!(decoded.position, snapshot.position);
    }
}
