//! Applying a target pose to the observed body.
//!
//! Small corrections converge exponentially so the residual steps between
//! interpolation segments are not visible. Large ones (respawns, long
//! desyncs) teleport, zero both velocities and report the jump so that
//! attached parts such as wheels can follow in the same frame.

use glam::{Quat, Vec3};

use crate::body::PhysicsBody;
use crate::snapshot::planar_distance;

/// Planar displacement at or above which the body teleports.
pub const TELEPORT_DISTANCE: f32 = 3000.0;

/// Squared distance under which smoothing lands exactly on the target.
const SNAP_EPSILON_SQ: f32 = 1e-8;

/// How a target pose was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presentation {
    /// Moved part of the way towards the target.
    Smoothed {
        /// Position after this frame's step.
        position: Vec3,
        /// Orientation after this frame's step.
        rotation: Quat,
    },
    /// Jumped straight to the target with velocities zeroed.
    Teleported {
        /// Position before the jump.
        from: Vec3,
        /// Position after the jump.
        to: Vec3,
    },
    /// The target was not finite; the body was left untouched.
    Rejected,
}

/// Moves a body towards presentation targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresentationApplier {
    /// Approach rate; `dt * smoothing_factor` of the remaining gap is closed
    /// per frame. Zero or less snaps.
    pub smoothing_factor: f32,
    /// Planar displacement that triggers a teleport instead of smoothing.
    pub teleport_distance: f32,
}

impl Default for PresentationApplier {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl PresentationApplier {
    /// Creates an applier with the default teleport distance.
    pub fn new(smoothing_factor: f32) -> Self {
        Self {
            smoothing_factor,
            teleport_distance: TELEPORT_DISTANCE,
        }
    }

    /// Fraction of the remaining gap closed in a frame of `dt` seconds.
    pub fn step_fraction(&self, dt: f32) -> f32 {
        if self.smoothing_factor <= 0.0 {
            return 1.0;
        }
        (dt * self.smoothing_factor).clamp(0.0, 1.0)
    }

    /// Applies one frame's step towards `target_position`/`target_rotation`.
    pub fn apply(
        &self,
        body: &mut impl PhysicsBody,
        target_position: Vec3,
        target_rotation: Quat,
        dt: f32,
    ) -> Presentation {
        if !(target_position.is_finite() && target_rotation.is_finite()) {
            tracing::debug!(
                target = ?target_position,
                "ignored non-finite presentation target"
            );
            return Presentation::Rejected;
        }

        let (position, rotation) = body.transform();

        if planar_distance(position, target_position) < self.teleport_distance {
            let alpha = self.step_fraction(dt);
            let next_position = if position.distance_squared(target_position) < SNAP_EPSILON_SQ {
                target_position
            } else {
                position.lerp(target_position, alpha)
            };
            let next_rotation = rotation.slerp(target_rotation, alpha);
            body.set_transform(next_position, next_rotation, false);
            Presentation::Smoothed {
                position: next_position,
                rotation: next_rotation,
            }
        } else {
            body.set_transform(target_position, target_rotation, true);
            body.set_linear_velocity(Vec3::ZERO);
            body.set_angular_velocity(Vec3::ZERO);
            tracing::warn!(
                from = ?position,
                to = ?target_position,
                "teleported body past smoothing range"
            );
            Presentation::Teleported {
                from: position,
                to: target_position,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::KinematicBody;

    #[test]
    fn test_small_correction_is_smoothed() {
        let mut body = KinematicBody::default();
        body.linear_velocity = Vec3::new(50.0, 0.0, 0.0);
        let applier = PresentationApplier::new(10.0);

        let out = applier.apply(&mut body, Vec3::new(100.0, 0.0, 0.0), Quat::IDENTITY, 0.05);
        assert!(matches!(out, Presentation::Smoothed { .. }));
        assert!((body.position.x - 50.0).abs() < 1e-4);
        assert_eq!(body.teleports, 0);
        assert_eq!(body.linear_velocity, Vec3::new(50.0, 0.0, 0.0));
    }

    #[test]
    fn test_smoothing_converges() {
        let mut body = KinematicBody::default();
        let applier = PresentationApplier::new(10.0);
        let target = Vec3::new(0.0, 800.0, 0.0);
        let target_rot = Quat::from_rotation_z(1.0);
        for _ in 0..120 {
            applier.apply(&mut body, target, target_rot, 1.0 / 60.0);
        }
        assert!((body.position - target).length() < 1e-2);
        assert!(body.rotation.angle_between(target_rot) < 1e-2);
    }

    #[test]
    fn test_large_displacement_teleports() {
        let mut body = KinematicBody::default();
        body.linear_velocity = Vec3::new(900.0, 0.0, 0.0);
        body.angular_velocity = Vec3::new(0.0, 0.0, 2.0);
        let applier = PresentationApplier::new(10.0);
        let target = Vec3::new(5000.0, 0.0, 0.0);

        let out = applier.apply(&mut body, target, Quat::IDENTITY, 1.0 / 60.0);
        assert_eq!(
            out,
            Presentation::Teleported {
                from: Vec3::ZERO,
                to: target,
            }
        );
        assert_eq!(body.position, target);
        assert_eq!(body.linear_velocity, Vec3::ZERO);
        assert_eq!(body.angular_velocity, Vec3::ZERO);
        assert_eq!(body.teleports, 1);
    }

    #[test]
    fn test_vertical_displacement_does_not_teleport() {
        let mut body = KinematicBody::default();
        let applier = PresentationApplier::new(10.0);
        let out = applier.apply(&mut body, Vec3::new(0.0, 0.0, 5000.0), Quat::IDENTITY, 0.01);
        assert!(matches!(out, Presentation::Smoothed { .. }));
    }

    #[test]
    fn test_non_finite_target_leaves_body_alone() {
        let mut body = KinematicBody::new(Vec3::new(100.0, 0.0, 0.0), Quat::IDENTITY);
        body.linear_velocity = Vec3::new(40.0, 0.0, 0.0);
        let applier = PresentationApplier::new(10.0);

        let out = applier.apply(&mut body, Vec3::new(f32::NAN, 0.0, 0.0), Quat::IDENTITY, 0.01);
        assert_eq!(out, Presentation::Rejected);
        let out = applier.apply(
            &mut body,
            Vec3::new(200.0, 0.0, 0.0),
            Quat::from_xyzw(0.0, 0.0, f32::INFINITY, 1.0),
            0.01,
        );
        assert_eq!(out, Presentation::Rejected);

        assert_eq!(body.position, Vec3::new(100.0, 0.0, 0.0));
        assert_eq!(body.linear_velocity, Vec3::new(40.0, 0.0, 0.0));
        assert_eq!(body.teleports, 0);
    }

    #[test]
    fn test_zero_smoothing_snaps() {
        let mut body = KinematicBody::default();
        let applier = PresentationApplier::new(0.0);
        applier.apply(&mut body, Vec3::new(10.0, 20.0, 0.0), Quat::IDENTITY, 0.01);
        assert_eq!(body.position, Vec3::new(10.0, 20.0, 0.0));
        assert_eq!(body.teleports, 0);
    }
}
