//! Unified error type for Pulsewire.

use pulsewire_protocol::ProtocolError;
use pulsewire_room::RoomError;
use pulsewire_transport::TransportError;

/// Close code sent when the handshake carried no credential.
pub const CLOSE_AUTH_REQUIRED: u16 = 4401;
/// Close code sent when the credential was rejected.
pub const CLOSE_AUTH_FAILED: u16 = 4403;
/// Close code sent when the connection saw no traffic for too long.
pub const CLOSE_IDLE_TIMEOUT: u16 = 4408;
/// Close code sent to a connection evicted by a newer one for the same
/// identity.
pub const CLOSE_SESSION_REPLACED: u16 = 4409;
/// Standard "going away" code, used on server shutdown.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Why a connection was refused before it was admitted.
///
/// The `Display` string doubles as the close reason, so clients can tell
/// "log in first" apart from "your token is bad" before retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The handshake carried no credential.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The verifier refused the credential, panicked, or returned a blank
    /// identity.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server is shutting down and admits nobody.
    #[error("Server shutting down")]
    ShuttingDown,
}

impl GatewayError {
    /// The websocket close code this rejection is reported with.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::AuthenticationRequired => CLOSE_AUTH_REQUIRED,
            Self::AuthenticationFailed(_) => CLOSE_AUTH_FAILED,
            Self::ShuttingDown => CLOSE_GOING_AWAY,
        }
    }
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PulsewireError {
    /// A transport-level error (bind, upgrade, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An encode or decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A connection was refused at the handshake.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A room command was refused.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}
