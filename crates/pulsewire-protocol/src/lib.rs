//! Wire protocol for Pulsewire.
//!
//! This crate defines the vocabulary clients and the server share:
//!
//! - **Naming** ([`UserId`], [`RoomKind`], [`RoomName`], [`EntityId`]) :
//!   who is connected and which topic they follow.
//! - **Commands** ([`ClientCommand`]): the closed set of things a client
//!   may ask for.
//! - **Events** ([`ServerEvent`] and its payloads): everything the
//!   server pushes, each stamped with server time via [`Stamped`].
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those values become
//!   frames.
//!
//! ```text
//! Transport (frames) → Protocol (commands/events) → Session & Room layers
//! ```

mod codec;
mod command;
mod error;
mod event;
mod types;

pub use codec::{Codec, JsonCodec};
pub use command::ClientCommand;
pub use error::ProtocolError;
pub use event::{
    AnalysisCompleted, AnalysisFailure, AnalysisProgress, BatchCompleted,
    BatchFailure, BatchProgress, CoachingHint, Connected, ErrorCode,
    ErrorPayload, GenerationCompleted, GenerationFailure, GenerationProgress,
    HintPriority, Pong, RoomAck, SamplingCompleted, SamplingFailure,
    SamplingProgress, ServerEvent, SessionUpdate, Stamped,
};
pub use types::{EntityId, RoomKind, RoomName, UserId};
