//! Movement synchronization for physics-driven vehicles.
//!
//! One peer (the owner) simulates the body and streams timestamped
//! [`Snapshot`]s; every other peer buffers them in a [`ReorderQueue`] and
//! replays them with a deliberate delay through the [`InterpolationEngine`].
//! Bodies at rest switch to a rarely-sent, reliably-delivered rest state.
//! [`SyncedVehicle`] wires the stages together per body.

pub mod body;
pub mod clock;
pub mod events;
pub mod gateway;
pub mod interpolation;
pub mod presentation;
pub mod reorder;
pub mod rest;
pub mod role;
pub mod sampler;
pub mod snapshot;
pub mod vehicle;

pub use body::{KinematicBody, PhysicsBody};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use convoy_config::SyncConfig;
pub use events::{SyncEvent, SyncEvents};
pub use gateway::{SendTimer, Transport};
pub use interpolation::{InterpolationEngine, InterpolationOutput};
pub use presentation::{Presentation, PresentationApplier};
pub use reorder::{InsertOutcome, MAX_QUEUED_SNAPSHOTS, ReorderQueue};
pub use rest::{RestDecision, classify};
pub use role::{Role, RoleFlags, resolve};
pub use sampler::sample;
pub use snapshot::{RestState, Snapshot};
pub use vehicle::SyncedVehicle;
