//! Transport abstraction layer for Pulsewire.
//!
//! Provides the [`Transport`], [`PendingConnection`] and [`Connection`]
//! traits that hide the network protocol from the notification engine,
//! plus the [`Handshake`] the transport captured while the connection was
//! being established.
//!
//! Accepting and upgrading are separate steps: [`Transport::accept`] only
//! takes the raw stream off the listener, and the protocol handshake runs
//! later in [`PendingConnection::upgrade`], typically on the connection's
//! own task. A peer that never finishes its handshake therefore cannot
//! hold up the accept loop.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Identifiers are never reused within a process, so a client that
/// reconnects always shows up as a brand-new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What the client presented while the connection was being opened.
///
/// The credential travels out-of-band from the command stream (an HTTP
/// header or query parameter on the upgrade request), so it is available
/// before a single application frame has been read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    token: Option<String>,
}

impl Handshake {
    /// Builds a handshake from a raw credential. Blank values count as
    /// "no credential".
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|t| !t.trim().is_empty());
        Self { token }
    }

    /// A handshake that carries no credential at all.
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    /// The credential, if one was supplied.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// A freshly accepted stream that has not been upgraded yet.
    type Pending: PendingConnection<Connection = Self::Connection, Error = Self::Error>;
    /// The connection type produced once the upgrade completes.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming stream. Returns as soon as the stream
    /// is off the listener; no bytes are read from the peer.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// An accepted stream waiting for its protocol handshake.
pub trait PendingConnection: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Runs the handshake and captures the credential.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;

    /// The identifier the upgraded connection will carry.
    fn id(&self) -> ConnectionId;
}

/// A single connection that can send and receive bytes.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends data to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection with a status code and a human-readable
    /// reason the client can inspect before deciding whether to retry.
    async fn close(&self, code: u16, reason: &str) -> Result<(), Self::Error>;

    /// Returns the credential captured during connection setup.
    fn handshake(&self) -> &Handshake;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_handshake_new_keeps_real_token() {
        let hs = Handshake::new(Some("abc.def".into()));
        assert_eq!(hs.token(), Some("abc.def"));
    }

    #[test]
    fn test_handshake_new_blank_token_is_absent() {
        assert_eq!(Handshake::new(Some(String::new())).token(), None);
        assert_eq!(Handshake::new(Some("   ".into())).token(), None);
        assert_eq!(Handshake::new(None), Handshake::anonymous());
    }
}
