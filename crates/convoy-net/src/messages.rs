//! Sync message types and serialization.
//!
//! All messages are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Use [`serialize_message`] and [`deserialize_message`] for
//! encoding/decoding, and [`dispatch`] to route a received payload into a
//! [`SyncedVehicle`].

use convoy_sync::{InsertOutcome, Role, Snapshot, SyncedVehicle};
use serde::{Deserialize, Serialize};

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level sync message. The enum discriminant is the type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SyncMessage {
    /// Moving-body snapshot. Sent on the unreliable channel.
    ActiveState(StateUpdate),
    /// Rest state, or the blank rest state on wake. Sent reliably.
    RestState(StateUpdate),
    /// Possession of a vehicle moved. Sent reliably to every peer.
    OwnerChanged(OwnerChange),
}

impl SyncMessage {
    /// The vehicle this message is about.
    pub fn vehicle_id(&self) -> u32 {
        match self {
            SyncMessage::ActiveState(update) | SyncMessage::RestState(update) => update.vehicle_id,
            SyncMessage::OwnerChanged(change) => change.vehicle_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// A snapshot for one vehicle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StateUpdate {
    /// Vehicle identifier.
    pub vehicle_id: u32,
    /// The sampled state. `local_timestamp` is not transmitted.
    pub snapshot: Snapshot,
}

/// Possession change notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerChange {
    /// Vehicle identifier.
    pub vehicle_id: u32,
    /// Peer whose player now controls the vehicle; `None` when nobody does.
    pub owner_peer: Option<u32>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`SyncMessage`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded SyncMessage]`
pub fn serialize_message(msg: &SyncMessage) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`SyncMessage`].
pub fn deserialize_message(data: &[u8]) -> Result<SyncMessage, MessageError> {
    let Some((&version, body)) = data.split_first() else {
        return Err(MessageError::EmptyPayload);
    };
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Identifies the receiving side of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerBinding {
    /// Vehicle the target [`SyncedVehicle`] represents.
    pub vehicle_id: u32,
    /// Peer the target runs on.
    pub local_peer: u32,
}

/// What [`dispatch`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// An active snapshot was offered to the queue. `None` if the vehicle
    /// ignored it outright.
    Active(Option<InsertOutcome>),
    /// A rest state was applied.
    Rest,
    /// A rest state decoded but carried NaN or infinite values and was
    /// discarded.
    Discarded,
    /// Possession changed.
    OwnerChanged {
        /// The vehicle's role after the change.
        role: Role,
        /// Peer now controlling the vehicle, if any.
        owner_peer: Option<u32>,
    },
    /// The message was for another vehicle.
    Ignored,
}

/// Decodes `data` and routes it to the matching receive callback of
/// `vehicle`.
pub fn dispatch(
    data: &[u8],
    binding: PeerBinding,
    vehicle: &mut SyncedVehicle,
    now: f64,
) -> Result<Dispatched, MessageError> {
    let msg = deserialize_message(data)?;
    if msg.vehicle_id() != binding.vehicle_id {
        return Ok(Dispatched::Ignored);
    }

    let dispatched = match msg {
        SyncMessage::ActiveState(update) => {
            Dispatched::Active(vehicle.on_receive_unreliable(update.snapshot, now))
        }
        SyncMessage::RestState(update) => {
            if vehicle.on_receive_reliable(update.snapshot) {
                Dispatched::Rest
            } else {
                Dispatched::Discarded
            }
        }
        SyncMessage::OwnerChanged(change) => {
            vehicle.on_possession_changed(
                change.owner_peer == Some(binding.local_peer),
                change.owner_peer.is_some(),
            );
            Dispatched::OwnerChanged {
                role: vehicle.role(),
                owner_peer: change.owner_peer,
            }
        }
    };
    Ok(dispatched)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_sync::{RoleFlags, SyncConfig};
    use glam::{Quat, Vec3};

    const BINDING: PeerBinding = PeerBinding {
        vehicle_id: 7,
        local_peer: 2,
    };

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::at(12.5, Vec3::new(1.0, -2.0, 3.5), Quat::from_rotation_z(0.7))
            .with_velocity(Vec3::new(300.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.5));
        snapshot.local_timestamp = 99.0;
        snapshot
    }

    fn observer() -> SyncedVehicle {
        SyncedVehicle::new(SyncConfig::default(), RoleFlags::remote_client())
    }

    #[test]
    fn test_active_state_roundtrip_drops_local_timestamp() {
        let msg = SyncMessage::ActiveState(StateUpdate {
            vehicle_id: 7,
            snapshot: snapshot(),
        });
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);

        let SyncMessage::ActiveState(decoded) = deserialize_message(&bytes).unwrap() else {
            panic!("wrong variant");
        };
        let mut expected = snapshot();
        expected.local_timestamp = 0.0;
        assert_eq!(decoded.snapshot, expected);
    }

    #[test]
    fn test_owner_changed_roundtrip() {
        let msg = SyncMessage::OwnerChanged(OwnerChange {
            vehicle_id: 3,
            owner_peer: None,
        });
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            deserialize_message(&[]),
            Err(MessageError::EmptyPayload)
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let msg = SyncMessage::RestState(StateUpdate {
            vehicle_id: 1,
            snapshot: Snapshot::default(),
        });
        let mut bytes = serialize_message(&msg).unwrap();
        bytes[0] = PROTOCOL_VERSION + 1;
        assert!(matches!(
            deserialize_message(&bytes),
            Err(MessageError::UnsupportedVersion(v)) if v == PROTOCOL_VERSION + 1
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let msg = SyncMessage::ActiveState(StateUpdate {
            vehicle_id: 7,
            snapshot: snapshot(),
        });
        let bytes = serialize_message(&msg).unwrap();
        assert!(matches!(
            deserialize_message(&bytes[..bytes.len() / 2]),
            Err(MessageError::Postcard(_))
        ));
    }

    #[test]
    fn test_dispatch_routes_active_state_into_queue() {
        let mut vehicle = observer();
        let bytes = serialize_message(&SyncMessage::ActiveState(StateUpdate {
            vehicle_id: 7,
            snapshot: snapshot(),
        }))
        .unwrap();

        let dispatched = dispatch(&bytes, BINDING, &mut vehicle, 1.0).unwrap();
        assert_eq!(dispatched, Dispatched::Active(Some(InsertOutcome::Inserted(0))));
        assert_eq!(vehicle.queue().len(), 1);
    }

    #[test]
    fn test_dispatch_ignores_other_vehicles() {
        let mut vehicle = observer();
        let bytes = serialize_message(&SyncMessage::RestState(StateUpdate {
            vehicle_id: 8,
            snapshot: snapshot(),
        }))
        .unwrap();

        assert_eq!(
            dispatch(&bytes, BINDING, &mut vehicle, 1.0).unwrap(),
            Dispatched::Ignored
        );
        assert!(!vehicle.is_resting());
    }

    #[test]
    fn test_dispatch_applies_rest_state() {
        let mut vehicle = observer();
        let bytes = serialize_message(&SyncMessage::RestState(StateUpdate {
            vehicle_id: 7,
            snapshot: snapshot(),
        }))
        .unwrap();

        assert_eq!(
            dispatch(&bytes, BINDING, &mut vehicle, 1.0).unwrap(),
            Dispatched::Rest
        );
        assert!(vehicle.is_resting());
    }

    #[test]
    fn test_dispatch_discards_non_finite_state_on_both_channels() {
        let mut vehicle = observer();
        let mut bad = snapshot();
        bad.position.x = f32::NAN;

        let active = serialize_message(&SyncMessage::ActiveState(StateUpdate {
            vehicle_id: 7,
            snapshot: bad,
        }))
        .unwrap();
        assert_eq!(
            dispatch(&active, BINDING, &mut vehicle, 1.0).unwrap(),
            Dispatched::Active(Some(InsertOutcome::Malformed))
        );
        assert!(vehicle.queue().is_empty());

        let mut bad_time = snapshot();
        bad_time.timestamp = f64::INFINITY;
        let rest = serialize_message(&SyncMessage::RestState(StateUpdate {
            vehicle_id: 7,
            snapshot: bad_time,
        }))
        .unwrap();
        assert_eq!(
            dispatch(&rest, BINDING, &mut vehicle, 1.0).unwrap(),
            Dispatched::Discarded
        );
        assert!(!vehicle.is_resting());
    }

    #[test]
    fn test_dispatch_owner_change_resolves_local_role() {
        let mut vehicle = observer();
        let to_me = serialize_message(&SyncMessage::OwnerChanged(OwnerChange {
            vehicle_id: 7,
            owner_peer: Some(2),
        }))
        .unwrap();
        assert_eq!(
            dispatch(&to_me, BINDING, &mut vehicle, 1.0).unwrap(),
            Dispatched::OwnerChanged {
                role: Role::Owner,
                owner_peer: Some(2),
            }
        );

        let to_other = serialize_message(&SyncMessage::OwnerChanged(OwnerChange {
            vehicle_id: 7,
            owner_peer: Some(4),
        }))
        .unwrap();
        assert_eq!(
            dispatch(&to_other, BINDING, &mut vehicle, 1.0).unwrap(),
            Dispatched::OwnerChanged {
                role: Role::RemoteObserving,
                owner_peer: Some(4),
            }
        );
    }

    #[test]
    fn test_dispatch_surfaces_decode_errors() {
        let mut vehicle = observer();
        assert!(dispatch(&[], BINDING, &mut vehicle, 1.0).is_err());
    }
}
