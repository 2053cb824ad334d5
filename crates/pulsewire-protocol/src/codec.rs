//! Codec trait and implementations for the wire format.
//!
//! The server loop never touches serde directly: it hands outbound
//! [`ServerEvent`]s to a [`Codec`] and asks it to turn inbound frames into
//! [`ClientCommand`]s. Swapping the wire format means swapping the codec.

use crate::{ClientCommand, ProtocolError, ServerEvent};

/// Converts between wire frames and protocol values.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an outbound event into one frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the event cannot be represented.
    fn encode_event(&self, event: &ServerEvent) -> Result<Vec<u8>, ProtocolError>;

    /// Parses one inbound frame into a command.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] for malformed frames or unknown
    /// command names.
    fn decode_command(&self, frame: &[u8]) -> Result<ClientCommand, ProtocolError>;
}

/// A [`Codec`] that speaks JSON text frames.
///
/// ## Example
///
/// ```rust
/// use pulsewire_protocol::{ClientCommand, Codec, EntityId, JsonCodec};
///
/// let codec = JsonCodec;
/// let cmd = codec
///     .decode_command(br#"{"event":"join-batch","data":"b-7"}"#)
///     .unwrap();
/// assert_eq!(cmd, ClientCommand::JoinBatch(EntityId::new("b-7")));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode_event(&self, event: &ServerEvent) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(event).map_err(ProtocolError::Encode)
    }

    fn decode_command(&self, frame: &[u8]) -> Result<ClientCommand, ProtocolError> {
        serde_json::from_slice(frame).map_err(ProtocolError::Decode)
    }
}
