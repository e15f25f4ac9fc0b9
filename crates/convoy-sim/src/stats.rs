//! Per-peer counters and divergence tracking for a simulation run.

use convoy_net::LinkStats;
use convoy_sync::{Role, SyncEvent};
use tracing::info;

/// Running position error between an observer and the owner.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DivergenceStats {
    samples: u64,
    sum: f64,
    max: f32,
    last: f32,
}

impl DivergenceStats {
    pub fn record(&mut self, error: f32) {
        self.samples += 1;
        self.sum += f64::from(error);
        self.max = self.max.max(error);
        self.last = error;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Mean error, or zero before any sample.
    pub fn mean(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.sum / self.samples as f64
        }
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Error at the most recent sample.
    pub fn last(&self) -> f32 {
        self.last
    }
}

/// How often each [`SyncEvent`] kind was raised on a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub owner_changes: u32,
    pub rest_changes: u32,
    pub teleports: u32,
    pub drops: u32,
}

impl EventCounts {
    pub fn record(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::OwnerChanged { .. } => self.owner_changes += 1,
            SyncEvent::RestStateChanged { .. } => self.rest_changes += 1,
            SyncEvent::Teleported { .. } => self.teleports += 1,
            SyncEvent::SnapshotDropped { .. } => self.drops += 1,
        }
    }
}

/// End-of-run summary for one peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerReport {
    pub peer: u32,
    pub final_role: Role,
    pub events: EventCounts,
    /// Error against the owner, sampled only while this peer observed.
    pub divergence: DivergenceStats,
}

/// End-of-run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SimReport {
    pub sim_time: f64,
    pub updates: u64,
    pub peers: Vec<PeerReport>,
    /// `(from, to, stats)` for every directed link.
    pub links: Vec<(u32, u32, LinkStats)>,
}

impl SimReport {
    /// Sum of every link's counters.
    pub fn link_totals(&self) -> LinkStats {
        self.links
            .iter()
            .fold(LinkStats::default(), |mut total, (_, _, stats)| {
                total.sent += stats.sent;
                total.dropped += stats.dropped;
                total.duplicated += stats.duplicated;
                total.delivered += stats.delivered;
                total
            })
    }

    pub fn log_summary(&self) {
        info!(
            sim_time = self.sim_time,
            updates = self.updates,
            "simulation finished"
        );
        for peer in &self.peers {
            info!(
                peer = peer.peer,
                role = ?peer.final_role,
                mean_error = peer.divergence.mean(),
                max_error = peer.divergence.max(),
                final_error = peer.divergence.last(),
                teleports = peer.events.teleports,
                drops = peer.events.drops,
                rest_changes = peer.events.rest_changes,
                owner_changes = peer.events.owner_changes,
                "peer summary"
            );
        }
        let totals = self.link_totals();
        info!(
            sent = totals.sent,
            dropped = totals.dropped,
            duplicated = totals.duplicated,
            delivered = totals.delivered,
            "link totals"
        );
    }
}
