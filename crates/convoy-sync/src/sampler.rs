//! Sampling the owning peer's body into a [`Snapshot`].

use crate::body::PhysicsBody;
use crate::snapshot::Snapshot;

/// Captures the body's current transform and velocities, stamped with `now`.
pub fn sample(body: &impl PhysicsBody, now: f64) -> Snapshot {
    let (position, rotation) = body.transform();
    Snapshot {
        timestamp: now,
        local_timestamp: 0.0,
        position,
        rotation,
        linear_velocity: body.linear_velocity(),
        angular_velocity: body.angular_velocity(),
    }
}
