//! Buffers a vehicle's outgoing sync traffic as encoded payloads.

use convoy_sync::{Snapshot, Transport};
use tracing::warn;

use crate::link::Channel;
use crate::messages::{OwnerChange, StateUpdate, SyncMessage, serialize_message};

/// An encoded message waiting to be put on a link.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    /// Channel the message must travel on.
    pub channel: Channel,
    /// Versioned postcard payload.
    pub bytes: Vec<u8>,
}

/// [`Transport`] that encodes into [`SyncMessage`] payloads for one vehicle.
///
/// The host drains it after each send tick and fans the payloads out to
/// every peer's link.
#[derive(Debug, Clone)]
pub struct Outbox {
    vehicle_id: u32,
    pending: Vec<Outgoing>,
    encode_failures: u64,
}

impl Outbox {
    pub fn new(vehicle_id: u32) -> Self {
        Self {
            vehicle_id,
            pending: Vec::new(),
            encode_failures: 0,
        }
    }

    pub fn vehicle_id(&self) -> u32 {
        self.vehicle_id
    }

    /// Queues a possession change for every peer.
    pub fn announce_owner(&mut self, owner_peer: Option<u32>) {
        self.push(
            Channel::Reliable,
            &SyncMessage::OwnerChanged(OwnerChange {
                vehicle_id: self.vehicle_id,
                owner_peer,
            }),
        );
    }

    /// Encodes and queues `msg`. Encode failures are logged and the message
    /// is dropped.
    pub fn push(&mut self, channel: Channel, msg: &SyncMessage) {
        match serialize_message(msg) {
            Ok(bytes) => self.pending.push(Outgoing { channel, bytes }),
            Err(e) => {
                self.encode_failures += 1;
                warn!(vehicle_id = self.vehicle_id, "failed to encode sync message: {e}");
            }
        }
    }

    /// Takes every queued payload, in send order.
    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Messages dropped because they could not be encoded.
    pub fn encode_failures(&self) -> u64 {
        self.encode_failures
    }

    fn update(&self, snapshot: &Snapshot) -> StateUpdate {
        StateUpdate {
            vehicle_id: self.vehicle_id,
            snapshot: *snapshot,
        }
    }
}

impl Transport for Outbox {
    fn send_unreliable(&mut self, snapshot: &Snapshot) {
        let msg = SyncMessage::ActiveState(self.update(snapshot));
        self.push(Channel::Unreliable, &msg);
    }

    fn send_reliable(&mut self, snapshot: &Snapshot) {
        let msg = SyncMessage::RestState(self.update(snapshot));
        self.push(Channel::Reliable, &msg);
    }
}
