//! Per-frame playback of queued snapshots on observing peers.
//!
//! The engine approaches the queue head from a start pose captured the
//! moment the approach begins, linearly in position and along the shortest
//! arc in rotation, and finishes each segment by snapping to the head's full
//! state (including velocities) so local physics carries on from there.

use glam::{Quat, Vec3};

use crate::body::PhysicsBody;
use crate::reorder::ReorderQueue;
use crate::sampler::sample;
use crate::snapshot::{RestState, Snapshot};

/// Lerp parameter at which a segment is considered finished.
pub const SEGMENT_COMPLETE: f64 = 0.99;

/// What the observer should present this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterpolationOutput {
    /// Nothing to do; physics and the last pose carry on.
    Hold,
    /// The body is resting; present the stored rest pose.
    Rest {
        /// Rest position.
        position: Vec3,
        /// Rest orientation.
        rotation: Quat,
    },
    /// The head was already within tolerance and has been dropped.
    Skipped,
    /// Mid-segment pose.
    Pose {
        /// Interpolated position.
        position: Vec3,
        /// Interpolated orientation.
        rotation: Quat,
        /// Segment progress in `[0, 1]`.
        t: f64,
    },
    /// The segment finished; present this state exactly, velocities included.
    Exact(Snapshot),
}

/// Segment progress at `now` for a segment running from `begin` to `end`,
/// clamped to `[0, 1]`. An empty or inverted segment is complete.
pub fn lerp_parameter(now: f64, begin: f64, end: f64) -> f64 {
    let span = end - begin;
    if span <= 0.0 {
        return 1.0;
    }
    ((now - begin) / span).clamp(0.0, 1.0)
}

/// Pose between `start` and `target` at progress `t`.
pub fn blend(start: &Snapshot, target: &Snapshot, t: f64) -> (Vec3, Quat) {
    let t = t.clamp(0.0, 1.0) as f32;
    (
        start.position.lerp(target.position, t),
        start.rotation.slerp(target.rotation, t),
    )
}

/// Turns the head of a [`ReorderQueue`] into a presentation pose each frame.
#[derive(Debug, Clone)]
pub struct InterpolationEngine {
    /// Pose the current segment started from; `None` until an approach
    /// begins.
    start: Option<Snapshot>,
    lerp_start_margin: f64,
    position_tolerance: f32,
}

impl InterpolationEngine {
    /// Creates an engine that begins approaching a snapshot
    /// `lerp_start_margin` seconds before its playback time and skips
    /// snapshots within `position_tolerance` of the start pose.
    pub fn new(lerp_start_margin: f64, position_tolerance: f32) -> Self {
        Self {
            start: None,
            lerp_start_margin,
            position_tolerance,
        }
    }

    /// The start pose of the current segment, if one has been captured.
    pub fn start_state(&self) -> Option<&Snapshot> {
        self.start.as_ref()
    }

    /// Forgets the current segment so the next one captures a new start pose.
    pub fn reset(&mut self) {
        self.start = None;
    }

    /// Runs one frame.
    pub fn tick(
        &mut self,
        now: f64,
        body: &impl PhysicsBody,
        rest: &RestState,
        is_resting: bool,
        queue: &mut ReorderQueue,
    ) -> InterpolationOutput {
        if is_resting {
            if !queue.is_empty() {
                queue.clear();
            }
            let rest = rest.snapshot();
            return InterpolationOutput::Rest {
                position: rest.position,
                rotation: rest.rotation,
            };
        }

        if queue.take_restart_request() {
            self.start = None;
        }

        let Some(target) = queue.head().copied() else {
            return InterpolationOutput::Hold;
        };

        if now < target.local_timestamp - self.lerp_start_margin {
            return InterpolationOutput::Hold;
        }

        let start = match self.start {
            Some(start) => start,
            None => {
                let start = sample(body, now);
                if start.position_nearly_equal(&target, self.position_tolerance) {
                    queue.pop_head();
                    tracing::trace!(timestamp = target.timestamp, "skipped snapshot within tolerance");
                    return InterpolationOutput::Skipped;
                }
                self.start = Some(start);
                start
            }
        };

        queue.mark_active(target.timestamp);

        let t = lerp_parameter(now, start.timestamp, target.local_timestamp);
        if t >= SEGMENT_COMPLETE || start.timestamp > target.local_timestamp {
            queue.pop_head();
            self.start = None;
            return InterpolationOutput::Exact(target);
        }

        let (position, rotation) = blend(&start, &target, t);
        InterpolationOutput::Pose {
            position,
            rotation,
            t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::KinematicBody;

    const MARGIN: f64 = 0.35;
    const TOLERANCE: f32 = 0.1;
    const TIME_BEHIND: f64 = 0.15;

    fn engine() -> InterpolationEngine {
        InterpolationEngine::new(MARGIN, TOLERANCE)
    }

    fn target(timestamp: f64, x: f32) -> Snapshot {
        Snapshot::at(timestamp, Vec3::new(x, 0.0, 0.0), Quat::IDENTITY)
            .with_velocity(Vec3::new(200.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 0.5))
    }

    #[test]
    fn test_lerp_parameter_is_clamped() {
        assert_eq!(lerp_parameter(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(lerp_parameter(0.5, 0.0, 1.0), 0.5);
        assert_eq!(lerp_parameter(7.0, 0.0, 1.0), 1.0);
        assert_eq!(lerp_parameter(1.0, 2.0, 2.0), 1.0);
        assert_eq!(lerp_parameter(1.0, 3.0, 2.0), 1.0);
    }

    #[test]
    fn test_blend_endpoints() {
        let start = Snapshot::at(0.0, Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(0.2));
        let end = Snapshot::at(1.0, Vec3::new(-4.0, 8.0, 0.5), Quat::from_rotation_z(2.5));

        let (p0, r0) = blend(&start, &end, 0.0);
        assert!((p0 - start.position).length() < 1e-5);
        assert!(r0.angle_between(start.rotation) < 1e-2);

        let (p1, r1) = blend(&start, &end, 1.0);
        assert!((p1 - end.position).length() < 1e-5);
        assert!(r1.angle_between(end.rotation) < 1e-2);
    }

    #[test]
    fn test_blend_takes_shortest_arc() {
        let start = Snapshot::at(0.0, Vec3::ZERO, Quat::from_rotation_z(0.1));
        // Same orientation as -0.1 rad, expressed with a negated quaternion.
        let end = Snapshot::at(1.0, Vec3::ZERO, -Quat::from_rotation_z(-0.1));
        let (_, mid) = blend(&start, &end, 0.5);
        assert!(mid.angle_between(Quat::IDENTITY) < 1e-2);
    }

    #[test]
    fn test_empty_queue_holds() {
        let mut queue = ReorderQueue::new();
        let body = KinematicBody::default();
        let out = engine().tick(1.0, &body, &RestState::default(), false, &mut queue);
        assert_eq!(out, InterpolationOutput::Hold);
    }

    #[test]
    fn test_waits_until_margin_before_playback_time() {
        // Playback at 2.15, so the approach may begin at 1.8.
        let mut queue = ReorderQueue::new();
        queue.insert(target(10.0, 500.0), 2.0, TIME_BEHIND);
        let body = KinematicBody::default();
        let mut engine = engine();

        let out = engine.tick(1.0, &body, &RestState::default(), false, &mut queue);
        assert_eq!(out, InterpolationOutput::Hold);
        assert!(engine.start_state().is_none());

        let out = engine.tick(1.9, &body, &RestState::default(), false, &mut queue);
        assert!(matches!(out, InterpolationOutput::Pose { .. }));
        assert!(engine.start_state().is_some());
    }

    #[test]
    fn test_segment_progresses_then_snaps_exactly() {
        let mut queue = ReorderQueue::new();
        // Playback time 1.0 + 0.15 = 1.15; approach opens at 0.8.
        queue.insert(target(10.0, 500.0), 1.0, TIME_BEHIND);
        let body = KinematicBody::default();
        let mut engine = engine();

        let out = engine.tick(0.8, &body, &RestState::default(), false, &mut queue);
        let InterpolationOutput::Pose { position, t, .. } = out else {
            panic!("expected pose, got {out:?}");
        };
        assert_eq!(t, 0.0);
        assert!(position.length() < 1e-4);
        assert_eq!(engine.start_state().unwrap().timestamp, 0.8);

        let out = engine.tick(0.975, &body, &RestState::default(), false, &mut queue);
        let InterpolationOutput::Pose { position, t, .. } = out else {
            panic!("expected pose, got {out:?}");
        };
        assert!((t - 0.5).abs() < 1e-9);
        assert!((position.x - 250.0).abs() < 1e-2);
        assert!((queue.last_active_timestamp() - 10.15).abs() < 1e-9);

        let out = engine.tick(1.2, &body, &RestState::default(), false, &mut queue);
        let InterpolationOutput::Exact(state) = out else {
            panic!("expected exact, got {out:?}");
        };
        assert_eq!(state.position.x, 500.0);
        assert_eq!(state.linear_velocity, Vec3::new(200.0, 0.0, 0.0));
        assert!(queue.is_empty());
        assert!(engine.start_state().is_none());
    }

    #[test]
    fn test_start_after_playback_time_snaps_immediately() {
        let mut queue = ReorderQueue::new();
        queue.insert(target(10.0, 500.0), 1.0, TIME_BEHIND);
        let body = KinematicBody::default();
        let mut engine = engine();

        let out = engine.tick(3.0, &body, &RestState::default(), false, &mut queue);
        assert!(matches!(out, InterpolationOutput::Exact(_)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_near_stationary_head_is_skipped_without_advancing() {
        let mut queue = ReorderQueue::new();
        queue.insert(target(10.0, 0.05), 1.0, TIME_BEHIND);
        queue.insert(target(10.05, 300.0), 1.0, TIME_BEHIND);
        let body = KinematicBody::default();
        let mut engine = engine();

        let out = engine.tick(1.0, &body, &RestState::default(), false, &mut queue);
        assert_eq!(out, InterpolationOutput::Skipped);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.last_active_timestamp(), 0.0);
        assert!(engine.start_state().is_none());

        // The next entry is approached from a freshly captured start pose.
        let out = engine.tick(1.0, &body, &RestState::default(), false, &mut queue);
        assert!(matches!(out, InterpolationOutput::Pose { .. }));
        assert!((queue.last_active_timestamp() - 10.2).abs() < 1e-9);
    }

    #[test]
    fn test_resting_presents_rest_pose_and_drains_queue() {
        let mut queue = ReorderQueue::new();
        queue.insert(target(10.0, 500.0), 1.0, TIME_BEHIND);
        let rest = RestState::from(Snapshot::at(3.0, Vec3::new(40.0, 60.0, 0.0), Quat::IDENTITY));
        let body = KinematicBody::default();

        let out = engine().tick(1.0, &body, &rest, true, &mut queue);
        assert_eq!(
            out,
            InterpolationOutput::Rest {
                position: Vec3::new(40.0, 60.0, 0.0),
                rotation: Quat::IDENTITY,
            }
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear_forces_new_start_state() {
        let mut queue = ReorderQueue::new();
        queue.insert(target(10.0, 500.0), 1.0, TIME_BEHIND);
        let mut body = KinematicBody::default();
        let mut engine = engine();
        engine.tick(0.9, &body, &RestState::default(), false, &mut queue);
        assert_eq!(engine.start_state().unwrap().position, Vec3::ZERO);

        queue.clear();
        body.position = Vec3::new(-200.0, 0.0, 0.0);
        queue.insert(target(20.0, 500.0), 1.0, TIME_BEHIND);
        engine.tick(1.0, &body, &RestState::default(), false, &mut queue);
        assert_eq!(engine.start_state().unwrap().position, body.position);
    }
}
