//! Notifications raised by a [`SyncedVehicle`](crate::SyncedVehicle).
//!
//! Events are collected during a call and drained by the caller afterwards,
//! so the vehicle never calls back into game code while it is mid-update.

use glam::Vec3;

use crate::reorder::InsertOutcome;
use crate::role::Role;
use crate::snapshot::RestState;

/// Something game code may want to react to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncEvent {
    /// Possession changed; the queue was cleared and the role re-resolved.
    OwnerChanged {
        /// Role after the change.
        role: Role,
    },
    /// A rest state was applied, locally or from the reliable channel.
    RestStateChanged {
        /// The rest state now stored.
        rest: RestState,
        /// Whether the body is now resting.
        is_resting: bool,
    },
    /// The body jumped instead of being smoothed. Attached parts should
    /// follow immediately.
    Teleported {
        /// Position before the jump.
        from: Vec3,
        /// Position after the jump.
        to: Vec3,
    },
    /// A received snapshot was not queued.
    SnapshotDropped {
        /// Why it was dropped.
        outcome: InsertOutcome,
    },
}

/// Most events held between drains. Hosts are expected to drain every tick.
pub const MAX_PENDING_EVENTS: usize = 64;

/// Pending events, oldest first, bounded by [`MAX_PENDING_EVENTS`].
///
/// When full, the oldest `SnapshotDropped` notice is evicted first, then the
/// oldest event of any kind.
#[derive(Debug, Clone, Default)]
pub struct SyncEvents {
    pending: Vec<SyncEvent>,
    evicted: u64,
}

impl SyncEvents {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event, evicting one if the collector is full.
    pub fn push(&mut self, event: SyncEvent) {
        if self.pending.len() >= MAX_PENDING_EVENTS {
            let victim = self
                .pending
                .iter()
                .position(|pending| matches!(pending, SyncEvent::SnapshotDropped { .. }))
                .unwrap_or(0);
            self.pending.remove(victim);
            self.evicted += 1;
            if self.evicted == 1 || self.evicted % 1000 == 0 {
                tracing::warn!(evicted = self.evicted, "sync events not drained, evicting");
            }
        }
        self.pending.push(event);
    }

    /// Events evicted because the collector was full.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Takes every pending event.
    pub fn drain(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Pending events without removing them.
    pub fn pending(&self) -> &[SyncEvent] {
        &self.pending
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
