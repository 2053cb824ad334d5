//! Connection gateway: turns a handshake into an admitted connection, and
//! guards room joins with the authorizer.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use pulsewire_protocol::{RoomKind, RoomName};
use pulsewire_room::{Authorizer, RoomError};
use pulsewire_session::{Identity, IdentityVerifier};
use pulsewire_transport::{ConnectionId, Handshake};

use crate::{ConnectionReceiver, GatewayError, Hub};

/// A connection that passed the handshake.
#[derive(Debug)]
pub struct Admission {
    pub identity: Identity,
    /// Outbound queue for the connection's task. Starts with `connected`.
    pub events: ConnectionReceiver,
}

/// Owns the two injected collaborators (who is this, and may they follow
/// that entity) and the hub they gate access to.
pub struct Gateway<V, Z> {
    hub: Arc<Hub>,
    verifier: V,
    authorizer: Z,
}

impl<V: IdentityVerifier, Z: Authorizer> Gateway<V, Z> {
    pub fn new(hub: Arc<Hub>, verifier: V, authorizer: Z) -> Self {
        Self {
            hub,
            verifier,
            authorizer,
        }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Verifies the handshake credential without touching any state.
    ///
    /// # Errors
    /// - [`GatewayError::AuthenticationRequired`]: no credential.
    /// - [`GatewayError::AuthenticationFailed`]: the verifier returned an
    ///   error, panicked, or produced an identity with a blank user id.
    pub async fn authenticate(&self, handshake: &Handshake) -> Result<Identity, GatewayError> {
        let token = handshake
            .token()
            .ok_or(GatewayError::AuthenticationRequired)?;

        let identity = match AssertUnwindSafe(self.verifier.verify(token))
            .catch_unwind()
            .await
        {
            Ok(Ok(identity)) => identity,
            Ok(Err(e)) => return Err(GatewayError::AuthenticationFailed(e.to_string())),
            Err(_) => {
                tracing::error!("identity verifier panicked");
                return Err(GatewayError::AuthenticationFailed(
                    "verifier error".to_string(),
                ));
            }
        };

        if identity.user_id.is_blank() {
            return Err(GatewayError::AuthenticationFailed(
                "no identity for token".to_string(),
            ));
        }
        Ok(identity)
    }

    /// Authenticates and, on success, registers `conn` with the hub.
    /// A rejected handshake leaves no trace in the hub.
    pub async fn admit(
        &self,
        conn: ConnectionId,
        handshake: &Handshake,
    ) -> Result<Admission, GatewayError> {
        let identity = self.authenticate(handshake).await?;
        let events = self.hub.register(conn, identity.clone()).await?;
        Ok(Admission { identity, events })
    }

    /// Joins `conn` to the room of `(kind, entity_id)` if the authorizer
    /// allows it.
    ///
    /// # Errors
    /// - [`RoomError::InvalidRoom`]: `entity_id` is blank. The authorizer
    ///   is not consulted.
    /// - [`RoomError::UnauthorizedAccess`]: the authorizer said no.
    /// - [`RoomError::NotConnected`]: `conn` was cleaned up meanwhile.
    pub async fn join(
        &self,
        conn: ConnectionId,
        identity: &Identity,
        kind: RoomKind,
        entity_id: &str,
    ) -> Result<RoomName, RoomError> {
        let room = RoomName::for_entity(kind, entity_id)
            .ok_or_else(|| RoomError::InvalidRoom(entity_id.to_string()))?;

        if !self.authorizer.can_join(identity, kind, entity_id).await {
            tracing::warn!(
                %conn,
                user_id = %identity.user_id,
                %room,
                "room join refused"
            );
            return Err(RoomError::UnauthorizedAccess {
                user_id: identity.user_id.clone(),
                room,
            });
        }

        self.hub.join(conn, room.as_str()).await
    }
}
