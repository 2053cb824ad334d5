//! Identity and room naming types shared by every layer.
//!
//! Rooms are plain strings namespaced by entity kind (`meeting-123`,
//! `batch-9`). Nothing below the protocol layer interprets the prefix:
//! [`RoomKind`] only exists so that callers derive room names the same
//! way everywhere.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// The verified user behind a connection.
///
/// `#[serde(transparent)]` keeps it a bare string on the wire, which is
/// what browser clients expect.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An identity whose id is blank is not an identity at all.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomKind
// ---------------------------------------------------------------------------

/// The five domain entities a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomKind {
    /// A meeting; carries analysis progress for that meeting.
    Meeting,
    /// One analysis run; carries smart-sampling progress.
    Analysis,
    /// A scenario-generation job.
    Generation,
    /// A live practice session; carries session updates and coaching hints.
    Session,
    /// A batch processing job.
    Batch,
}

impl RoomKind {
    /// The room-name prefix for this kind, without the trailing dash.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Meeting => "meeting",
            Self::Analysis => "analysis",
            Self::Generation => "generation",
            Self::Session => "session",
            Self::Batch => "batch",
        }
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

// ---------------------------------------------------------------------------
// RoomName
// ---------------------------------------------------------------------------

/// A broadcast topic key, e.g. `meeting-123`.
///
/// A `RoomName` is never empty or whitespace-only; the constructors
/// return `None` for such input so an invalid name cannot reach the
/// membership index.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    /// Wraps an already-formed room key.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    /// Derives the room for one entity: `<kind>-<entity_id>`.
    ///
    /// Returns `None` when the entity id is blank, so `meeting-` and
    /// `meeting-   ` are never produced.
    pub fn for_entity(kind: RoomKind, entity_id: &str) -> Option<Self> {
        if entity_id.trim().is_empty() {
            return None;
        }
        Some(Self(format!("{}-{}", kind.prefix(), entity_id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// The argument of a join command.
///
/// JavaScript clients send ids as strings or numbers depending on where
/// they came from; both forms name the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawEntityId")]
#[serde(into = "String")]
pub struct EntityId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntityId {
    Text(String),
    Number(i64),
}

impl From<RawEntityId> for EntityId {
    fn from(raw: RawEntityId) -> Self {
        match raw {
            RawEntityId::Text(s) => Self(s),
            RawEntityId::Number(n) => Self(n.to_string()),
        }
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
