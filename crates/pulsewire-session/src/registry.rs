//! The session registry: which identities are connected, and through
//! which connections.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself. The server keeps it
//! behind the same lock as the room index, because disconnect cleanup
//! has to update both in one step.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use pulsewire_protocol::UserId;
use pulsewire_transport::ConnectionId;

use crate::UnknownPolicy;

/// What happens when an identity that is already connected connects again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Every connection stays live (several tabs or devices per user).
    /// The identity counts as connected while any of them is open.
    #[default]
    MultiConnection,

    /// Only the newest connection survives. Registering a second
    /// connection evicts the first; the caller is told which connection
    /// was evicted so it can purge and close it.
    SingleConnection,
}

impl FromStr for SessionPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multi" | "multi-connection" => Ok(Self::MultiConnection),
            "single" | "single-connection" => Ok(Self::SingleConnection),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// Maps each identity to its live connections.
///
/// ## Lifecycle
///
/// ```text
/// register(user, conn) ──→ [connected] ──→ unregister(user, conn)
///        │
///        └── SingleConnection: previous conn returned as evicted
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    policy: SessionPolicy,
    /// Never holds an empty set: the entry is removed with its last
    /// connection, so `len()` is the number of connected identities.
    sessions: HashMap<UserId, BTreeSet<ConnectionId>>,
}

impl SessionRegistry {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            policy,
            sessions: HashMap::new(),
        }
    }

    /// Records `conn` as a live connection of `user_id`.
    ///
    /// Returns the connections this registration evicted: always empty
    /// under [`SessionPolicy::MultiConnection`], at most the previous
    /// connection under [`SessionPolicy::SingleConnection`].
    pub fn register(
        &mut self,
        user_id: UserId,
        conn: ConnectionId,
    ) -> Vec<ConnectionId> {
        let connections = self.sessions.entry(user_id.clone()).or_default();

        let evicted = match self.policy {
            SessionPolicy::MultiConnection => Vec::new(),
            SessionPolicy::SingleConnection => {
                let previous: Vec<_> = connections
                    .iter()
                    .copied()
                    .filter(|c| *c != conn)
                    .collect();
                connections.clear();
                previous
            }
        };
        connections.insert(conn);

        if !evicted.is_empty() {
            tracing::info!(
                %user_id,
                %conn,
                evicted = evicted.len(),
                "session replaced by newer connection"
            );
        }
        evicted
    }

    /// Forgets `conn` for `user_id`. Returns `false` (and does nothing)
    /// if that connection wasn't registered.
    pub fn unregister(&mut self, user_id: &UserId, conn: ConnectionId) -> bool {
        let Some(connections) = self.sessions.get_mut(user_id) else {
            return false;
        };
        let removed = connections.remove(&conn);
        if connections.is_empty() {
            self.sessions.remove(user_id);
        }
        removed
    }

    /// True while at least one connection for `user_id` is live.
    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.sessions.contains_key(user_id)
    }

    /// Live connections of one identity, oldest id first.
    pub fn connections_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.sessions
            .get(user_id)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of distinct connected identities.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops every session.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}
