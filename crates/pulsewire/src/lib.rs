//! # Pulsewire
//!
//! Authenticated real-time progress notifications over websockets.
//!
//! Background jobs (meeting analysis, smart sampling, scenario generation,
//! batch processing, live practice sessions) report progress through a
//! [`Hub`]. Browser clients connect with a bearer token, subscribe to the
//! rooms of the entities they care about (`meeting-123`, `batch-9`), and
//! receive every event emitted to those rooms.
//!
//! You supply two collaborators: an
//! [`IdentityVerifier`](pulsewire_session::IdentityVerifier) that turns a
//! token into a user, and an [`Authorizer`](pulsewire_room::Authorizer)
//! that decides who may follow which entity. The framework handles
//! transport, sessions, rooms, and fan-out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pulsewire::prelude::*;
//!
//! struct Verifier;
//!
//! impl IdentityVerifier for Verifier {
//!     async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
//!         // Check the JWT here.
//!         Ok(Identity::new(token))
//!     }
//! }
//!
//! # async fn run() -> Result<(), PulsewireError> {
//! let server = PulsewireServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(Verifier, AllowAll)
//!     .await?;
//!
//! let hub = server.hub();
//! tokio::spawn(async move {
//!     hub.emit_batch_error("b-1", "worker crashed").await;
//! });
//!
//! server.run().await
//! # }
//! ```

mod broadcast;
mod config;
mod error;
mod gateway;
mod handler;
mod hub;
mod server;

pub use config::{ENV_BIND, ENV_IDLE_TIMEOUT_SECS, ENV_SESSION_POLICY, ServerConfig};
pub use error::{
    CLOSE_AUTH_FAILED, CLOSE_AUTH_REQUIRED, CLOSE_GOING_AWAY, CLOSE_IDLE_TIMEOUT,
    CLOSE_SESSION_REPLACED, GatewayError, PulsewireError,
};
pub use gateway::{Admission, Gateway};
pub use hub::{ConnectionInfo, ConnectionReceiver, ConnectionSender, Hub, Outbound};
pub use server::{PulsewireServer, PulsewireServerBuilder};

/// Everything needed to run a server and emit events.
pub mod prelude {
    pub use crate::{GatewayError, Hub, PulsewireError, PulsewireServer, ServerConfig};
    pub use pulsewire_protocol::{
        AnalysisProgress, BatchProgress, CoachingHint, GenerationProgress,
        HintPriority, RoomKind, RoomName, SamplingProgress, ServerEvent,
        SessionUpdate, UserId,
    };
    pub use pulsewire_room::{AllowAll, Authorizer};
    pub use pulsewire_session::{Identity, IdentityVerifier, SessionPolicy, VerifyError};
}
