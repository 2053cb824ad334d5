//! Identity verification hook.
//!
//! Pulsewire doesn't verify credentials itself. Token issuance and
//! signature checks belong to the auth service; the server only needs a
//! function from "credential string" to "identity or failure". The
//! [`IdentityVerifier`] trait is that function.
//!
//! Implementations should bound their own latency (e.g. with a timeout
//! on the key-server call) and report a timeout as
//! [`VerifyError::Unavailable`]. The gateway treats any failure,
//! including a panic inside `verify`, as "Authentication failed".

use pulsewire_protocol::UserId;

use crate::VerifyError;

/// The verified user behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: Option<String>,
}

impl Identity {
    /// An identity with only a user id.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Turns a handshake credential into an [`Identity`].
///
/// # Example
///
/// ```rust
/// use pulsewire_session::{Identity, IdentityVerifier, VerifyError};
///
/// /// Accepts `user:<id>` tokens. Development only.
/// struct PrefixVerifier;
///
/// impl IdentityVerifier for PrefixVerifier {
///     async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
///         token
///             .strip_prefix("user:")
///             .map(Identity::new)
///             .ok_or_else(|| VerifyError::InvalidToken("missing prefix".into()))
///     }
/// }
/// ```
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Validates `token` and returns who it belongs to.
    ///
    /// # Returns
    /// - `Ok(Identity)`: the token is valid. An identity whose user id is
    ///   blank is still rejected by the gateway.
    /// - `Err(VerifyError)`: the token is invalid, expired, or could not
    ///   be checked.
    fn verify(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, VerifyError>> + Send;
}
