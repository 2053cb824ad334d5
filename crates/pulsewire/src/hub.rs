//! The hub: every piece of shared connection state behind one lock.
//!
//! The session registry, the room index, and the outbound channel of each
//! admitted connection change together on connect, join, and disconnect,
//! and are read together on every emit. Keeping them under a single
//! `Mutex` means no caller can observe a membership edge that is only
//! half recorded, or a room member whose channel is already gone.
//!
//! ```text
//! handler task ──register/join/leave/on_disconnect──┐
//!                                                   ▼
//!                                    Hub { Mutex<HubState> }
//!                                                   │
//! producer ──emit_*──────────────── members(room) ──┴──→ Outbound channel
//!                                                         per connection
//! ```
//!
//! Critical sections never await: sends into the unbounded per-connection
//! channels are synchronous. Writing to the socket happens later, in the
//! connection's own task.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use pulsewire_protocol::{RoomName, ServerEvent, UserId};
use pulsewire_room::{RoomError, RoomIndex};
use pulsewire_session::{Identity, SessionPolicy, SessionRegistry};
use pulsewire_transport::ConnectionId;
use tokio::sync::{Mutex, mpsc};

use crate::error::{CLOSE_GOING_AWAY, CLOSE_SESSION_REPLACED};
use crate::GatewayError;

/// What a connection's task is told to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Encode and write this event.
    Event(ServerEvent),
    /// Close the transport with this code and reason, then stop.
    Close { code: u16, reason: String },
}

/// Sending half of a connection's outbound queue.
pub type ConnectionSender = mpsc::UnboundedSender<Outbound>;

/// Receiving half, drained by the connection's task.
pub type ConnectionReceiver = mpsc::UnboundedReceiver<Outbound>;

struct ConnectionEntry {
    identity: Identity,
    sender: ConnectionSender,
    connected_at: DateTime<Utc>,
}

/// A snapshot of one admitted connection, for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub identity: Identity,
    pub connected_at: DateTime<Utc>,
    pub rooms: Vec<RoomName>,
}

pub(crate) struct HubState {
    sessions: SessionRegistry,
    rooms: RoomIndex,
    connections: HashMap<ConnectionId, ConnectionEntry>,
    shut_down: bool,
}

impl HubState {
    fn send(&self, conn: ConnectionId, outbound: Outbound) -> bool {
        self.connections
            .get(&conn)
            .is_some_and(|entry| entry.sender.send(outbound).is_ok())
    }

    /// Delivers `event` to every current member of `room`. Returns how
    /// many connections it was handed to.
    pub(crate) fn deliver(&self, room: &RoomName, event: &ServerEvent) -> usize {
        self.rooms
            .members(room.as_str())
            .into_iter()
            .filter(|conn| self.send(*conn, Outbound::Event(event.clone())))
            .count()
    }

    /// Purges one connection from the index and drops its channel.
    /// Returns its entry if it was still admitted.
    fn purge(&mut self, conn: ConnectionId) -> Option<ConnectionEntry> {
        let entry = self.connections.remove(&conn)?;
        self.rooms.leave_all(conn);
        self.sessions.unregister(&entry.identity.user_id, conn);
        Some(entry)
    }
}

/// Shared state of a running server: who is connected and who follows
/// which room.
///
/// One `Hub` is created per server and shared as `Arc<Hub>` between the
/// connection tasks and any number of event producers.
pub struct Hub {
    pub(crate) state: Mutex<HubState>,
}

impl Hub {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            state: Mutex::new(HubState {
                sessions: SessionRegistry::new(policy),
                rooms: RoomIndex::new(),
                connections: HashMap::new(),
                shut_down: false,
            }),
        }
    }

    /// Admits `conn` for `identity` and returns the queue its task must
    /// drain. A `connected` event is already waiting in the queue.
    ///
    /// Under [`SessionPolicy::SingleConnection`] the identity's previous
    /// connection is purged from every room and told to close with
    /// "Session replaced".
    ///
    /// # Errors
    /// [`GatewayError::ShuttingDown`] once [`shutdown`](Self::shutdown)
    /// has run.
    pub async fn register(
        &self,
        conn: ConnectionId,
        identity: Identity,
    ) -> Result<ConnectionReceiver, GatewayError> {
        let mut state = self.state.lock().await;
        if state.shut_down {
            return Err(GatewayError::ShuttingDown);
        }

        let evicted = state.sessions.register(identity.user_id.clone(), conn);
        for old in evicted {
            state.rooms.leave_all(old);
            if let Some(entry) = state.connections.remove(&old) {
                let _ = entry.sender.send(Outbound::Close {
                    code: CLOSE_SESSION_REPLACED,
                    reason: "Session replaced".to_string(),
                });
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Outbound::Event(ServerEvent::connected(
            conn.into_inner(),
            identity.user_id.clone(),
        )));

        state.rooms.track(conn);
        tracing::info!(%conn, user_id = %identity.user_id, "connection admitted");
        state.connections.insert(
            conn,
            ConnectionEntry {
                identity,
                sender: tx,
                connected_at: Utc::now(),
            },
        );
        Ok(rx)
    }

    /// Adds `conn` to `room` and acknowledges with `room-joined`.
    ///
    /// No access check happens here; the gateway asks the authorizer
    /// first. Joining a room twice is acknowledged again.
    ///
    /// # Errors
    /// - [`RoomError::InvalidRoom`]: `room` is empty or whitespace.
    /// - [`RoomError::NotConnected`]: `conn` is not admitted.
    pub async fn join(
        &self,
        conn: ConnectionId,
        room: &str,
    ) -> Result<RoomName, RoomError> {
        let name = RoomName::parse(room)
            .ok_or_else(|| RoomError::InvalidRoom(room.to_string()))?;

        let mut state = self.state.lock().await;
        if state.rooms.join(conn, name.as_str())? {
            tracing::info!(%conn, room = %name, "joined room");
        }
        state.send(conn, Outbound::Event(ServerEvent::room_joined(name.clone())));
        Ok(name)
    }

    /// Removes `conn` from `room` and acknowledges with `room-left`.
    /// Leaving a room the connection isn't in is still acknowledged.
    ///
    /// # Errors
    /// Same as [`join`](Self::join).
    pub async fn leave(
        &self,
        conn: ConnectionId,
        room: &str,
    ) -> Result<RoomName, RoomError> {
        let name = RoomName::parse(room)
            .ok_or_else(|| RoomError::InvalidRoom(room.to_string()))?;

        let mut state = self.state.lock().await;
        if !state.rooms.is_tracked(conn) {
            return Err(RoomError::NotConnected(conn));
        }
        if state.rooms.leave(conn, &name) {
            tracing::info!(%conn, room = %name, "left room");
        }
        state.send(conn, Outbound::Event(ServerEvent::room_left(name.clone())));
        Ok(name)
    }

    /// Queues `event` for one connection. Returns `false` if the
    /// connection is not admitted (or its task is already gone).
    pub async fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.state.lock().await.send(conn, Outbound::Event(event))
    }

    /// Tears down everything recorded for `conn`: its room memberships
    /// first, then its session.
    ///
    /// Returns `true` if there was anything to tear down. Calling it again
    /// for the same connection (or for one that was evicted or shut down)
    /// is a no-op returning `false`.
    pub async fn on_disconnect(&self, conn: ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        match state.purge(conn) {
            Some(entry) => {
                tracing::info!(
                    %conn,
                    user_id = %entry.identity.user_id,
                    "connection cleaned up"
                );
                true
            }
            None => false,
        }
    }

    /// Closes every connection with "Server shutting down", clears all
    /// state, and refuses further registrations.
    ///
    /// Returns the number of connections that were told to close.
    pub async fn shutdown(&self) -> usize {
        let mut state = self.state.lock().await;
        state.shut_down = true;

        let closed = state
            .connections
            .drain()
            .filter(|(_, entry)| {
                entry
                    .sender
                    .send(Outbound::Close {
                        code: CLOSE_GOING_AWAY,
                        reason: GatewayError::ShuttingDown.to_string(),
                    })
                    .is_ok()
            })
            .count();
        state.rooms.clear();
        state.sessions.clear();

        tracing::info!(closed, "hub shut down");
        closed
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Number of distinct connected identities.
    pub async fn connected_user_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Number of admitted connections (one identity may hold several).
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    pub async fn is_user_connected(&self, user_id: &UserId) -> bool {
        self.state.lock().await.sessions.is_connected(user_id)
    }

    /// Rooms joined by any live connection of `user_id`.
    pub async fn rooms_of_user(&self, user_id: &UserId) -> BTreeSet<RoomName> {
        let state = self.state.lock().await;
        state
            .sessions
            .connections_of(user_id)
            .into_iter()
            .flat_map(|conn| state.rooms.rooms_of(conn))
            .collect()
    }

    /// Identities with at least one connection in `room`. Unknown and
    /// blank room names have no members.
    pub async fn members_of_room(&self, room: &str) -> BTreeSet<UserId> {
        let state = self.state.lock().await;
        state
            .rooms
            .members(room)
            .into_iter()
            .filter_map(|conn| state.connections.get(&conn))
            .map(|entry| entry.identity.user_id.clone())
            .collect()
    }

    pub async fn rooms_of_connection(&self, conn: ConnectionId) -> Vec<RoomName> {
        self.state.lock().await.rooms.rooms_of(conn)
    }

    /// Number of rooms with at least one member.
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.rooms.room_count()
    }

    pub async fn connection_info(&self, conn: ConnectionId) -> Option<ConnectionInfo> {
        let state = self.state.lock().await;
        state.connections.get(&conn).map(|entry| ConnectionInfo {
            id: conn,
            identity: entry.identity.clone(),
            connected_at: entry.connected_at,
            rooms: state.rooms.rooms_of(conn),
        })
    }

    /// Whether both directions of the room index agree. For tests.
    pub async fn is_consistent(&self) -> bool {
        self.state.lock().await.rooms.is_consistent()
    }
}
