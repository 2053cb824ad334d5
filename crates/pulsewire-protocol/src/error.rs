//! Error types for the protocol layer.

/// Errors raised while turning frames into commands or events into frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound event failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// An inbound frame was not a well-formed command.
    ///
    /// Common causes: malformed JSON, an unknown `event` name, or a
    /// `data` field of the wrong shape.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
