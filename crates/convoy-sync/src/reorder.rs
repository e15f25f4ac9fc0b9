//! Bounded, time-ordered playback buffer for received snapshots.
//!
//! Snapshots arrive late, out of order, duplicated or not at all. The queue
//! shifts every accepted snapshot into the future by a fixed playback delay,
//! keeps entries sorted by that shifted time, and reschedules them onto the
//! local clock by carrying the sender's inter-snapshot deltas forward from
//! the head entry. The head is never rescheduled once queued, since it may
//! already be mid-interpolation.

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// Maximum number of queued snapshots. Further inserts are dropped.
pub const MAX_QUEUED_SNAPSHOTS: usize = 10;

/// Result of [`ReorderQueue::insert`]. Every variant other than `Inserted`
/// is an expected drop under lossy delivery, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOutcome {
    /// Accepted at this index.
    Inserted(usize),
    /// The queue was full; the incoming snapshot was dropped.
    Overflow,
    /// Older than the last snapshot already played back.
    Stale,
    /// Same shifted timestamp as a queued snapshot.
    Duplicate,
    /// Not later than the head entry, which anchors the schedule.
    BeforeHead,
    /// Carried a NaN or infinite field.
    Malformed,
}

impl InsertOutcome {
    /// Returns `true` if the snapshot was queued.
    pub fn is_inserted(self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Receiver-side reorder buffer for one synchronized body.
#[derive(Debug, Clone)]
pub struct ReorderQueue {
    entries: Vec<Snapshot>,
    /// Shifted timestamp of the snapshot most recently played back.
    last_active_timestamp: f64,
    /// Set by [`clear`](Self::clear); tells the interpolator to capture a
    /// fresh start state.
    restart_requested: bool,
}

impl ReorderQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_QUEUED_SNAPSHOTS),
            last_active_timestamp: 0.0,
            restart_requested: true,
        }
    }

    /// Queues a received snapshot for playback `time_behind` seconds later
    /// than it was sent.
    pub fn insert(&mut self, mut snapshot: Snapshot, now: f64, time_behind: f64) -> InsertOutcome {
        if !snapshot.is_finite() {
            return InsertOutcome::Malformed;
        }
        if self.entries.len() >= MAX_QUEUED_SNAPSHOTS {
            return InsertOutcome::Overflow;
        }

        snapshot.timestamp += time_behind;

        if snapshot.timestamp < self.last_active_timestamp {
            return InsertOutcome::Stale;
        }

        if self.entries.is_empty() {
            snapshot.local_timestamp = now + time_behind;
            self.entries.push(snapshot);
            return InsertOutcome::Inserted(0);
        }

        let mut index = None;
        for (i, queued) in self.entries.iter().enumerate().rev() {
            if queued.timestamp == snapshot.timestamp {
                return InsertOutcome::Duplicate;
            }
            if queued.timestamp < snapshot.timestamp {
                index = Some(i + 1);
                break;
            }
        }

        let Some(index) = index else {
            return InsertOutcome::BeforeHead;
        };

        self.entries.insert(index, snapshot);
        self.recalculate_local_timestamps();
        InsertOutcome::Inserted(index)
    }

    /// Re-derives every non-head playback time from the sender-clock deltas.
    fn recalculate_local_timestamps(&mut self) {
        for i in 1..self.entries.len() {
            let delta = self.entries[i].timestamp - self.entries[i - 1].timestamp;
            self.entries[i].local_timestamp = self.entries[i - 1].local_timestamp + delta;
        }
    }

    /// Empties the queue, forgets the playback position and requests a fresh
    /// interpolation start state.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_active_timestamp = 0.0;
        self.restart_requested = true;
    }

    /// The snapshot currently being approached.
    pub fn head(&self) -> Option<&Snapshot> {
        self.entries.first()
    }

    /// Removes and returns the head snapshot.
    pub fn pop_head(&mut self) -> Option<Snapshot> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// Records that playback has reached `timestamp` (shifted sender time).
    pub fn mark_active(&mut self, timestamp: f64) {
        self.last_active_timestamp = timestamp;
    }

    /// Shifted timestamp of the snapshot most recently played back.
    pub fn last_active_timestamp(&self) -> f64 {
        self.last_active_timestamp
    }

    /// Returns and resets the fresh-start request raised by [`clear`](Self::clear).
    pub fn take_restart_request(&mut self) -> bool {
        std::mem::take(&mut self.restart_requested)
    }

    /// Queued snapshots, head first.
    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    /// Number of queued snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ReorderQueue {
    fn default() -> Self {
        Self::new()
    }
}
