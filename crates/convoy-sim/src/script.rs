//! Scripted driving for whichever peer currently owns the vehicle.
//!
//! The run is split into phases by fraction of its duration so the same
//! script works for short test runs and long soak runs:
//! accelerate, cruise through a turn, brake to rest, idle, restart, and a
//! final brake. Partway through the restart the vehicle respawns far enough
//! away to force observers onto the teleport path.

use convoy_sync::{KinematicBody, PhysicsBody};
use glam::Vec3;
use tracing::info;

/// Forward acceleration in units per second squared.
pub const ACCELERATION: f32 = 600.0;
/// Braking deceleration in units per second squared.
pub const BRAKING: f32 = 1500.0;
/// Displacement applied by the respawn. Well past the teleport distance.
pub const RESPAWN_OFFSET: Vec3 = Vec3::new(0.0, 5000.0, 0.0);

/// Where the run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accelerate,
    Cruise,
    Brake,
    Idle,
    Restart,
    FinalBrake,
}

impl Phase {
    /// Phase for a run `fraction` of the way through.
    pub fn at(fraction: f64) -> Self {
        match fraction {
            f if f < 0.15 => Phase::Accelerate,
            f if f < 0.35 => Phase::Cruise,
            f if f < 0.45 => Phase::Brake,
            f if f < 0.55 => Phase::Idle,
            f if f < 0.88 => Phase::Restart,
            _ => Phase::FinalBrake,
        }
    }

    /// Commanded forward speed and yaw rate (radians per second).
    pub fn command(self) -> (f32, f32) {
        match self {
            Phase::Accelerate => (1200.0, 0.0),
            Phase::Cruise => (1200.0, 0.3),
            Phase::Brake | Phase::Idle | Phase::FinalBrake => (0.0, 0.0),
            Phase::Restart => (900.0, -0.2),
        }
    }
}

/// Drives the owning body through the scripted run.
#[derive(Debug, Clone)]
pub struct DriveScript {
    duration: f64,
    respawned: bool,
}

impl DriveScript {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            respawned: false,
        }
    }

    pub fn phase(&self, t: f64) -> Phase {
        Phase::at(t / self.duration)
    }

    /// Sim time of the respawn jump.
    pub fn respawn_at(&self) -> f64 {
        self.duration * 0.8
    }

    /// Sets the body's velocities for time `t`. Returns `true` if the body
    /// respawned during this call.
    pub fn drive(&mut self, t: f64, dt: f32, body: &mut KinematicBody) -> bool {
        let (target_speed, yaw_rate) = self.phase(t).command();

        let forward = (body.rotation * Vec3::X).truncate().extend(0.0).normalize_or_zero();
        let speed = body.linear_velocity.dot(forward).max(0.0);
        let rate = if target_speed > speed { ACCELERATION } else { BRAKING };
        let speed = approach(speed, target_speed, rate * dt);

        body.set_linear_velocity(forward * speed);
        body.set_angular_velocity(Vec3::new(0.0, 0.0, yaw_rate));

        if !self.respawned && t >= self.respawn_at() {
            self.respawned = true;
            let from = body.position;
            body.set_transform(from + RESPAWN_OFFSET, body.rotation, true);
            info!(from = ?from, to = ?body.position, "vehicle respawned");
            return true;
        }
        false
    }
}

fn approach(current: f32, target: f32, max_step: f32) -> f32 {
    if (target - current).abs() <= max_step {
        target
    } else if target > current {
        current + max_step
    } else {
        current - max_step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_phases_cover_the_run() {
        assert_eq!(Phase::at(0.0), Phase::Accelerate);
        assert_eq!(Phase::at(0.2), Phase::Cruise);
        assert_eq!(Phase::at(0.4), Phase::Brake);
        assert_eq!(Phase::at(0.5), Phase::Idle);
        assert_eq!(Phase::at(0.6), Phase::Restart);
        assert_eq!(Phase::at(0.95), Phase::FinalBrake);
        assert_eq!(Phase::at(1.5), Phase::FinalBrake);
    }

    #[test]
    fn test_acceleration_is_rate_limited() {
        let mut script = DriveScript::new(30.0);
        let mut body = KinematicBody::default();
        script.drive(0.0, 0.5, &mut body);
        assert!((body.linear_velocity.x - 300.0).abs() < 1e-3);
        for _ in 0..10 {
            script.drive(0.1, 0.5, &mut body);
        }
        assert!((body.linear_velocity.x - 1200.0).abs() < 1e-3);
    }

    #[test]
    fn test_speed_follows_heading() {
        let mut script = DriveScript::new(30.0);
        let mut body = KinematicBody::new(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        script.drive(0.0, 0.1, &mut body);
        assert!(body.linear_velocity.x.abs() < 1e-3);
        assert!((body.linear_velocity.y - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_brake_phase_stops_the_body() {
        let mut script = DriveScript::new(30.0);
        let mut body = KinematicBody::default();
        body.linear_velocity = Vec3::new(1200.0, 0.0, 0.0);
        let t = 0.4 * 30.0;
        for _ in 0..60 {
            script.drive(t, DT, &mut body);
        }
        assert_eq!(body.linear_velocity, Vec3::ZERO);
        assert_eq!(body.angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_respawn_happens_once() {
        let mut script = DriveScript::new(10.0);
        let mut body = KinematicBody::default();
        assert!(!script.drive(7.9, DT, &mut body));
        assert!(script.drive(8.05, DT, &mut body));
        assert!(!script.drive(8.1, DT, &mut body));
        assert_eq!(body.position, RESPAWN_OFFSET);
        assert_eq!(body.teleports, 1);
    }
}
