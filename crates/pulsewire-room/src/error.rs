//! Error types for the room layer.

use pulsewire_protocol::{RoomName, UserId};
use pulsewire_transport::ConnectionId;

/// Command-level failures. None of these close the connection; they are
/// reported back to the client that issued the command.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room identifier was empty or only whitespace.
    #[error("invalid room identifier {0:?}")]
    InvalidRoom(String),

    /// The caller is not entitled to the entity behind the room.
    #[error("user {user_id} is not allowed to join {room}")]
    UnauthorizedAccess { user_id: UserId, room: RoomName },

    /// The connection is not (or no longer) admitted.
    #[error("connection {0} is not admitted")]
    NotConnected(ConnectionId),
}
