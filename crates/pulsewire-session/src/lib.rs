//! Identity and session tracking for Pulsewire.
//!
//! This crate answers two questions:
//!
//! 1. **Who is this?**: the [`IdentityVerifier`] seam turns a handshake
//!    credential into an [`Identity`]. Verification itself (JWT checks,
//!    user lookups) lives outside Pulsewire.
//! 2. **Who is connected?**: the [`SessionRegistry`] maps each identity
//!    to its live connections, under an explicit [`SessionPolicy`].
//!
//! ```text
//! Room Layer (above)     ← membership keyed by connection
//!     ↕
//! Session Layer (this)   ← identity ↔ connections
//!     ↕
//! Protocol / Transport   ← UserId, ConnectionId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;

pub use auth::{Identity, IdentityVerifier};
pub use error::{UnknownPolicy, VerifyError};
pub use registry::{SessionPolicy, SessionRegistry};
