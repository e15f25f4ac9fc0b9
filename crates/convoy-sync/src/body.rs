//! The narrow interface through which sync reads and drives a physics body.
//!
//! Any simulation backend that can report and set a transform and the two
//! velocities plugs into the sync pipeline unchanged.

use glam::{Quat, Vec3};

/// A simulated rigid body, as seen by movement sync.
pub trait PhysicsBody {
    /// Current world position and orientation.
    fn transform(&self) -> (Vec3, Quat);
    /// Current linear velocity.
    fn linear_velocity(&self) -> Vec3;
    /// Current angular velocity (radians per second).
    fn angular_velocity(&self) -> Vec3;
    /// Overrides the linear velocity.
    fn set_linear_velocity(&mut self, velocity: Vec3);
    /// Overrides the angular velocity.
    fn set_angular_velocity(&mut self, velocity: Vec3);
    /// Moves the body. `teleport` means the move is a discontinuity and the
    /// backend must not sweep or derive velocity from it.
    fn set_transform(&mut self, position: Vec3, rotation: Quat, teleport: bool);
}

// ---------------------------------------------------------------------------
// KinematicBody
// ---------------------------------------------------------------------------

/// A minimal in-memory body that integrates its own velocities.
///
/// Stands in for a real physics backend in tests and in the headless
/// simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicBody {
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub rotation: Quat,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Angular velocity (radians per second).
    pub angular_velocity: Vec3,
    /// Number of teleporting moves applied so far.
    pub teleports: u32,
}

impl Default for KinematicBody {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }
}

impl KinematicBody {
    /// Creates a motionless body at the given pose.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            teleports: 0,
        }
    }

    /// Advances the body by `dt` seconds using its current velocities.
    pub fn integrate(&mut self, dt: f32) {
        self.position += self.linear_velocity * dt;
        let spin = Quat::from_scaled_axis(self.angular_velocity * dt);
        self.rotation = (spin * self.rotation).normalize();
    }

    /// Bleeds off both velocities at `rate` per second, standing in for
    /// ground friction.
    pub fn apply_damping(&mut self, rate: f32, dt: f32) {
        let keep = (1.0 - rate * dt).clamp(0.0, 1.0);
        self.linear_velocity *= keep;
        self.angular_velocity *= keep;
    }
}

impl PhysicsBody for KinematicBody {
    fn transform(&self) -> (Vec3, Quat) {
        (self.position, self.rotation)
    }

    fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear_velocity = velocity;
    }

    fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.angular_velocity = velocity;
    }

    fn set_transform(&mut self, position: Vec3, rotation: Quat, teleport: bool) {
        self.position = position;
        self.rotation = rotation;
        if teleport {
            self.teleports += 1;
        }
    }
}
