//! Network role of the local instance of a synchronized body.
//!
//! Every stage of the pipeline asks "who am I for this body?" each tick. The
//! answer is a pure function of four flags, resolved in a fixed priority
//! order so that conflicting flags can never produce an ambiguous role.

use serde::{Deserialize, Serialize};

/// Which side of the sync this instance is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// This instance simulates the body and is its source of truth. Either a
    /// local player controls it, or it is the server simulating an
    /// unpossessed body.
    Owner,
    /// The server, while a remote player controls the body.
    AuthorityObserving,
    /// A non-server process with authority over a body it spawned itself.
    /// Kept apart for bookkeeping; behaves like observing.
    ClientSpawned,
    /// A client observing a body someone else controls.
    RemoteObserving,
}

impl Role {
    /// Returns `true` if this instance produces snapshots.
    pub fn is_owner(self) -> bool {
        matches!(self, Role::Owner)
    }

    /// Returns `true` if this instance consumes snapshots.
    pub fn is_observer(self) -> bool {
        !self.is_owner()
    }
}

/// The inputs to [`resolve`], kept together per body instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFlags {
    /// A controller on this process drives the body.
    pub locally_controlled: bool,
    /// This process is the authoritative server.
    pub server_process: bool,
    /// Some player (anywhere) currently controls the body.
    pub player_controlled: bool,
    /// This process holds authority over the body's representation.
    pub has_authority: bool,
}

impl RoleFlags {
    /// Flags for the server, with nobody possessing the body.
    pub fn server() -> Self {
        Self {
            server_process: true,
            has_authority: true,
            ..Default::default()
        }
    }

    /// Flags for a plain client that does not control the body.
    pub fn remote_client() -> Self {
        Self::default()
    }

    /// Resolves the role for these flags.
    pub fn role(&self) -> Role {
        resolve(
            self.locally_controlled,
            self.server_process,
            self.player_controlled,
            self.has_authority,
        )
    }
}

/// Resolves the local role for a body.
pub fn resolve(
    is_locally_controlled: bool,
    is_server_process: bool,
    is_player_controlled: bool,
    has_authority: bool,
) -> Role {
    if is_locally_controlled {
        Role::Owner
    } else if is_server_process {
        if is_player_controlled {
            Role::AuthorityObserving
        } else {
            Role::Owner
        }
    } else if has_authority {
        Role::ClientSpawned
    } else {
        Role::RemoteObserving
    }
}
