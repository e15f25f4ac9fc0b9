//! Wire format and simulated transport for vehicle movement sync.

pub mod link;
pub mod messages;
pub mod outbox;

pub use link::{Channel, Delivery, LinkConditions, LinkStats, SimulatedLink};
pub use messages::{
    Dispatched, MessageError, OwnerChange, PROTOCOL_VERSION, PeerBinding, StateUpdate, SyncMessage,
    deserialize_message, dispatch, serialize_message,
};
pub use outbox::{Outbox, Outgoing};
