//! Error types for the session layer.

/// Why an identity verifier refused a credential.
///
/// The gateway treats every variant the same way (the connection is
/// rejected as "Authentication failed"); the distinction exists for logs.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The token was malformed or its signature did not check out.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token was well-formed but is past its expiry.
    #[error("token expired")]
    Expired,

    /// The verifier could not reach whatever backs it (key server,
    /// user store) or gave up waiting for it.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// A session policy name that isn't one of `multi` or `single`.
#[derive(Debug, thiserror::Error)]
#[error("unknown session policy {0:?} (expected \"multi\" or \"single\")")]
pub struct UnknownPolicy(pub String);
