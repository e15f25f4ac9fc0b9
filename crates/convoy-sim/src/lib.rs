//! Headless simulator for vehicle movement sync.
//!
//! Runs one owning peer and any number of observers over seeded lossy links
//! and reports how closely each observer tracked the owner.

pub mod error;
pub mod script;
pub mod sim;
pub mod stats;
pub mod stepper;

pub use error::SimError;
pub use script::{DriveScript, Phase};
pub use sim::{SERVER_PEER, Simulation, VEHICLE_ID};
pub use stats::{DivergenceStats, EventCounts, PeerReport, SimReport};
pub use stepper::FixedStepper;
