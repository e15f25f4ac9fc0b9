//! Per-body orchestration of the sync pipeline.
//!
//! A [`SyncedVehicle`] lives on every peer that knows about a body. Whether it
//! streams or replays is decided each call from its [`RoleFlags`], so a
//! possession change flips the direction of the pipeline without rebuilding
//! anything.

use convoy_config::SyncConfig;
use glam::{Quat, Vec3};
use tracing::{debug, info};

use crate::body::PhysicsBody;
use crate::events::{SyncEvent, SyncEvents};
use crate::gateway::{SendTimer, Transport, broadcast};
use crate::interpolation::{InterpolationEngine, InterpolationOutput};
use crate::presentation::{Presentation, PresentationApplier};
use crate::reorder::{InsertOutcome, ReorderQueue};
use crate::rest::{RestDecision, classify};
use crate::role::{Role, RoleFlags};
use crate::sampler::sample;
use crate::snapshot::{RestState, Snapshot};

/// Sync state for one body instance on one peer.
#[derive(Debug, Clone)]
pub struct SyncedVehicle {
    config: SyncConfig,
    flags: RoleFlags,
    queue: ReorderQueue,
    engine: InterpolationEngine,
    applier: PresentationApplier,
    rest: RestState,
    is_resting: bool,
    timer: SendTimer,
    events: SyncEvents,
}

impl SyncedVehicle {
    /// Creates the sync state for a body. The send timer runs from the start
    /// when movement replication and server sync are both enabled.
    pub fn new(config: SyncConfig, flags: RoleFlags) -> Self {
        let mut vehicle = Self {
            queue: ReorderQueue::new(),
            engine: InterpolationEngine::new(config.lerp_start_margin, config.position_tolerance),
            applier: PresentationApplier::new(config.smoothing_factor),
            rest: RestState::default(),
            is_resting: false,
            timer: SendTimer::new(config.send_rate),
            events: SyncEvents::new(),
            config,
            flags,
        };
        if vehicle.is_syncing() {
            vehicle.timer.start();
        }
        vehicle
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current role, resolved from the flags.
    pub fn role(&self) -> Role {
        self.flags.role()
    }

    pub fn flags(&self) -> RoleFlags {
        self.flags
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The last applied rest state.
    pub fn rest_state(&self) -> &RestState {
        &self.rest
    }

    pub fn is_resting(&self) -> bool {
        self.is_resting
    }

    /// Received snapshots awaiting playback.
    pub fn queue(&self) -> &ReorderQueue {
        &self.queue
    }

    pub fn send_timer(&self) -> &SendTimer {
        &self.timer
    }

    /// Movement replication and server sync are both enabled.
    pub fn is_syncing(&self) -> bool {
        self.config.replicate_movement && self.config.should_sync_with_server
    }

    /// Takes every event raised since the last call.
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.events.drain()
    }

    // -----------------------------------------------------------------------
    // Frame tick (observers)
    // -----------------------------------------------------------------------

    /// Runs one frame. Observers replay the queue onto `body`; owners leave
    /// the body to local physics.
    pub fn tick(&mut self, now: f64, dt: f32, body: &mut impl PhysicsBody) -> InterpolationOutput {
        if self.role().is_owner() || !self.is_syncing() {
            return InterpolationOutput::Hold;
        }

        let output = self
            .engine
            .tick(now, body, &self.rest, self.is_resting, &mut self.queue);

        match output {
            InterpolationOutput::Hold | InterpolationOutput::Skipped => {}
            InterpolationOutput::Rest { position, rotation }
            | InterpolationOutput::Pose {
                position, rotation, ..
            } => self.present(body, position, rotation, dt),
            InterpolationOutput::Exact(state) => {
                self.present(body, state.position, state.rotation, dt);
                body.set_linear_velocity(state.linear_velocity);
                body.set_angular_velocity(state.angular_velocity);
            }
        }
        output
    }

    fn present(
        &mut self,
        body: &mut impl PhysicsBody,
        position: Vec3,
        rotation: Quat,
        dt: f32,
    ) {
        if let Presentation::Teleported { from, to } = self.applier.apply(body, position, rotation, dt) {
            self.events.push(SyncEvent::Teleported { from, to });
        }
    }

    // -----------------------------------------------------------------------
    // Send side (owner)
    // -----------------------------------------------------------------------

    /// Advances the send timer by `dt` and broadcasts once if at least one
    /// period elapsed. Catching up several periods still sends a single
    /// sample, since the body can only be sampled at `now`. Returns the number
    /// of periods elapsed.
    pub fn advance_send_timer(
        &mut self,
        dt: f64,
        now: f64,
        body: &impl PhysicsBody,
        transport: &mut impl Transport,
    ) -> u32 {
        let fires = self.timer.advance(dt);
        if fires > 0 {
            self.send_state(now, body, transport);
        }
        fires
    }

    /// One send tick: samples the body, broadcasts what changed and applies
    /// any new rest state locally. Does nothing unless this instance owns the
    /// body.
    pub fn send_state(
        &mut self,
        now: f64,
        body: &impl PhysicsBody,
        transport: &mut impl Transport,
    ) -> RestDecision {
        if !self.role().is_owner() {
            return RestDecision::default();
        }

        let candidate = sample(body, now);
        let decision = classify(&candidate, &self.rest, self.is_resting);
        broadcast(&decision, transport);

        if let Some(rest) = decision.rest {
            self.apply_rest_state(rest);
        }
        if !self.queue.is_empty() {
            self.queue.clear();
        }
        decision
    }

    // -----------------------------------------------------------------------
    // Receive side
    // -----------------------------------------------------------------------

    /// Handles an active snapshot from the unreliable channel. Returns `None`
    /// if the snapshot was ignored outright (owner, or sync disabled).
    pub fn on_receive_unreliable(&mut self, snapshot: Snapshot, now: f64) -> Option<InsertOutcome> {
        if !self.config.should_sync_with_server || self.role().is_owner() {
            return None;
        }

        let outcome = self.queue.insert(snapshot, now, self.config.time_behind);
        if !outcome.is_inserted() {
            debug!(
                timestamp = snapshot.timestamp,
                queued = self.queue.len(),
                ?outcome,
                "dropped snapshot"
            );
            self.events.push(SyncEvent::SnapshotDropped { outcome });
        }
        Some(outcome)
    }

    /// Handles a rest state from the reliable channel. Applied even while
    /// sync is disabled so that a re-enabled observer starts from the
    /// correct pose. Returns `false` if the snapshot was discarded as
    /// non-finite.
    pub fn on_receive_reliable(&mut self, snapshot: Snapshot) -> bool {
        if !snapshot.is_finite() {
            debug!(timestamp = snapshot.timestamp, "discarded non-finite rest state");
            return false;
        }
        self.apply_rest_state(RestState::from(snapshot));
        true
    }

    /// Stores a rest state and raises [`SyncEvent::RestStateChanged`]. Every
    /// rest change, local or remote, goes through here.
    pub fn apply_rest_state(&mut self, rest: RestState) {
        self.rest = rest;
        self.is_resting = rest.is_resting();
        info!(
            is_resting = self.is_resting,
            position = ?rest.snapshot().position,
            "rest state changed"
        );
        self.events.push(SyncEvent::RestStateChanged {
            rest,
            is_resting: self.is_resting,
        });
    }

    // -----------------------------------------------------------------------
    // Ownership and toggles
    // -----------------------------------------------------------------------

    /// Possession changed somewhere. Call on every peer.
    pub fn on_possession_changed(&mut self, is_locally_controlled: bool, is_player_controlled: bool) {
        self.flags.locally_controlled = is_locally_controlled;
        self.flags.player_controlled = is_player_controlled;
        self.queue.clear();

        let role = self.role();
        info!(?role, "owner changed");
        self.events.push(SyncEvent::OwnerChanged { role });
    }

    pub fn set_should_sync_with_server(&mut self, enabled: bool) {
        self.config.should_sync_with_server = enabled;
        self.update_replication_timer();
    }

    pub fn set_replicate_movement(&mut self, enabled: bool) {
        self.config.replicate_movement = enabled;
        self.update_replication_timer();
    }

    fn update_replication_timer(&mut self) {
        if self.is_syncing() {
            self.timer.start();
        } else {
            self.timer.stop();
            self.is_resting = false;
            self.queue.clear();
        }
    }
}

#[cfg(test)]
#[path = "vehicle_tests.rs"]
mod tests;
