//! The room membership index: who is in which room.
//!
//! Two maps describe the same set of `(connection, room)` edges from
//! both ends:
//!
//! ```text
//! rooms:        "meeting-123" → {conn-1, conn-4}
//! memberships:  conn-1        → {"meeting-123", "batch-9"}
//! ```
//!
//! Every mutation touches both maps before returning, so an edge is
//! either recorded in both directions or in neither. The index is
//! kind-agnostic: it never looks inside a room name.
//!
//! Like the session registry, `RoomIndex` is a plain struct; callers
//! provide the locking.

use std::collections::{BTreeSet, HashMap};

use pulsewire_protocol::RoomName;
use pulsewire_transport::ConnectionId;

use crate::RoomError;

/// Two-way index between connections and the rooms they follow.
#[derive(Debug, Default)]
pub struct RoomIndex {
    /// Room → members. A room with no members has no entry.
    rooms: HashMap<RoomName, BTreeSet<ConnectionId>>,

    /// Connection → rooms. Admitted connections have an entry even when
    /// they have joined nothing yet.
    memberships: HashMap<ConnectionId, BTreeSet<RoomName>>,
}

impl RoomIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an admitted connection with an empty room set.
    pub fn track(&mut self, conn: ConnectionId) {
        self.memberships.entry(conn).or_default();
    }

    /// Whether `conn` is tracked (admitted and not yet cleaned up).
    pub fn is_tracked(&self, conn: ConnectionId) -> bool {
        self.memberships.contains_key(&conn)
    }

    /// Adds `conn` to `room`.
    ///
    /// Returns `Ok(true)` for a new membership and `Ok(false)` if the
    /// connection was already a member.
    ///
    /// # Errors
    /// - [`RoomError::InvalidRoom`]: `room` is empty or whitespace. Nothing
    ///   is modified.
    /// - [`RoomError::NotConnected`]: `conn` was never tracked or has
    ///   already left.
    pub fn join(&mut self, conn: ConnectionId, room: &str) -> Result<bool, RoomError> {
        let room = RoomName::parse(room)
            .ok_or_else(|| RoomError::InvalidRoom(room.to_string()))?;

        let joined = self
            .memberships
            .get_mut(&conn)
            .ok_or(RoomError::NotConnected(conn))?;
        let added = joined.insert(room.clone());
        self.rooms.entry(room).or_default().insert(conn);
        Ok(added)
    }

    /// Removes one membership edge. Returns `false` if it didn't exist.
    pub fn leave(&mut self, conn: ConnectionId, room: &RoomName) -> bool {
        let removed = self
            .memberships
            .get_mut(&conn)
            .is_some_and(|joined| joined.remove(room));
        if removed {
            self.remove_member(room, conn);
        }
        removed
    }

    /// Removes `conn` from every room and stops tracking it.
    ///
    /// Returns the rooms it was in. Safe to call for connections that
    /// joined nothing or were already removed.
    pub fn leave_all(&mut self, conn: ConnectionId) -> Vec<RoomName> {
        let Some(joined) = self.memberships.remove(&conn) else {
            return Vec::new();
        };
        for room in &joined {
            self.remove_member(room, conn);
        }
        joined.into_iter().collect()
    }

    /// Current members of `room`. Unknown rooms have no members.
    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        RoomName::parse(room)
            .and_then(|name| self.rooms.get(&name))
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rooms `conn` currently belongs to.
    pub fn rooms_of(&self, conn: ConnectionId) -> Vec<RoomName> {
        self.memberships
            .get(&conn)
            .map(|joined| joined.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Forgets every room and connection.
    pub fn clear(&mut self) {
        self.rooms.clear();
        self.memberships.clear();
    }

    /// Checks that both directions describe the same edges and that no
    /// empty room lingers. Intended for tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        let forward = self.rooms.iter().all(|(room, members)| {
            !members.is_empty()
                && members.iter().all(|conn| {
                    self.memberships
                        .get(conn)
                        .is_some_and(|joined| joined.contains(room))
                })
        });
        let backward = self.memberships.iter().all(|(conn, joined)| {
            joined.iter().all(|room| {
                self.rooms
                    .get(room)
                    .is_some_and(|members| members.contains(conn))
            })
        });
        forward && backward
    }

    fn remove_member(&mut self, room: &RoomName, conn: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&conn);
            if members.is_empty() {
                self.rooms.remove(room);
                tracing::debug!(%room, "room emptied");
            }
        }
    }
}
