//! Inbound commands: what a client may ask of the server.
//!
//! On the wire a command looks like
//! `{ "event": "join-meeting", "data": "123" }`. The set is closed: an
//! unknown `event` fails to decode instead of silently hitting no handler.

use serde::{Deserialize, Serialize};

use crate::{EntityId, RoomKind};

/// A command sent by an admitted client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Subscribe to `meeting-<id>`.
    JoinMeeting(EntityId),
    /// Subscribe to `analysis-<id>`.
    JoinAnalysis(EntityId),
    /// Subscribe to `generation-<id>`.
    JoinGeneration(EntityId),
    /// Subscribe to `session-<id>`.
    JoinSession(EntityId),
    /// Subscribe to `batch-<id>`.
    JoinBatch(EntityId),
    /// Unsubscribe from one room, given by its full key.
    LeaveRoom(String),
    /// Keep-alive; answered with `pong`.
    Ping,
}

impl ClientCommand {
    /// For join commands, the room kind and entity id they target.
    pub fn join_target(&self) -> Option<(RoomKind, &EntityId)> {
        match self {
            Self::JoinMeeting(id) => Some((RoomKind::Meeting, id)),
            Self::JoinAnalysis(id) => Some((RoomKind::Analysis, id)),
            Self::JoinGeneration(id) => Some((RoomKind::Generation, id)),
            Self::JoinSession(id) => Some((RoomKind::Session, id)),
            Self::JoinBatch(id) => Some((RoomKind::Batch, id)),
            Self::LeaveRoom(_) | Self::Ping => None,
        }
    }
}
