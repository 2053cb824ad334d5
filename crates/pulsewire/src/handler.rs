//! Per-connection handler: admission, command dispatch, event delivery.
//!
//! Each accepted stream gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the websocket upgrade → drop the stream if it fails
//!   2. Verify the handshake credential → close with 4401/4403 on failure
//!   3. Register with the hub → `connected` is queued
//!   4. Loop: read commands, write queued events, watch the idle timer
//!   5. On exit, purge the connection from every room and the registry

use std::sync::Arc;

use pulsewire_protocol::{ClientCommand, Codec, ErrorCode, ServerEvent};
use pulsewire_room::{Authorizer, RoomError};
use pulsewire_session::{Identity, IdentityVerifier};
use pulsewire_transport::{Connection, ConnectionId, PendingConnection, PendingWebSocket};
use tokio::time::Instant;

use crate::error::{CLOSE_GOING_AWAY, CLOSE_IDLE_TIMEOUT};
use crate::server::ServerState;
use crate::{GatewayError, Hub, Outbound, PulsewireError};

/// Drop guard that purges the connection if the handler exits without
/// reaching its own cleanup (a panic, or the task being aborted).
///
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async lock.
struct DisconnectGuard {
    conn_id: ConnectionId,
    hub: Arc<Hub>,
    armed: bool,
}

impl DisconnectGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let conn_id = self.conn_id;
        let hub = Arc::clone(&self.hub);
        tokio::spawn(async move {
            hub.on_disconnect(conn_id).await;
        });
    }
}

/// Why the message loop stopped.
enum Exit {
    ClientClosed,
    Errored,
    IdleTimeout,
    Closed { code: u16, reason: String },
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<V, Z, C>(
    pending: PendingWebSocket,
    state: Arc<ServerState<V, Z, C>>,
) -> Result<(), PulsewireError>
where
    V: IdentityVerifier,
    Z: Authorizer,
    C: Codec,
{
    let conn_id = pending.id();
    let peer = pending.peer_addr();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    // --- Step 1: Upgrade ---
    let conn = match pending.upgrade().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(%conn_id, %peer, error = %e, "upgrade failed");
            return Err(e.into());
        }
    };

    // --- Step 2: Handshake ---
    let admission = match state.gateway.admit(conn_id, conn.handshake()).await {
        Ok(admission) => admission,
        Err(e) => {
            tracing::warn!(%conn_id, reason = %e, "handshake rejected");
            conn.close(e.close_code(), &e.to_string()).await?;
            return Err(e.into());
        }
    };
    let identity = admission.identity;
    let mut events = admission.events;

    let mut guard = DisconnectGuard {
        conn_id,
        hub: Arc::clone(state.gateway.hub()),
        armed: true,
    };

    // --- Step 3: Message loop ---
    let idle_timeout = state.config.idle_timeout;
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    let exit = loop {
        tokio::select! {
            frame = conn.recv() => match frame {
                Ok(Some(data)) => {
                    idle.as_mut().reset(Instant::now() + idle_timeout);
                    handle_frame(&*state, conn_id, &identity, &data).await;
                }
                Ok(None) => break Exit::ClientClosed,
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break Exit::Errored;
                }
            },

            outbound = events.recv() => match outbound {
                Some(Outbound::Event(event)) => {
                    let bytes = match state.codec.encode_event(&event) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            tracing::warn!(
                                %conn_id, event = event.name(), error = %e,
                                "failed to encode event"
                            );
                            continue;
                        }
                    };
                    if let Err(e) = conn.send(&bytes).await {
                        tracing::warn!(%conn_id, error = %e, "send failed");
                        break Exit::Errored;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    break Exit::Closed { code, reason };
                }
                // Channel dropped without a close instruction: the hub
                // is gone.
                None => break Exit::Closed {
                    code: CLOSE_GOING_AWAY,
                    reason: GatewayError::ShuttingDown.to_string(),
                },
            },

            () = &mut idle => break Exit::IdleTimeout,
        }
    };

    // --- Step 4: Teardown ---
    match exit {
        Exit::ClientClosed => {
            tracing::info!(%conn_id, user_id = %identity.user_id, "connection closed cleanly");
        }
        Exit::Errored => {}
        Exit::IdleTimeout => {
            tracing::info!(%conn_id, user_id = %identity.user_id, "connection idle, closing");
            let _ = conn.close(CLOSE_IDLE_TIMEOUT, "Idle timeout").await;
        }
        Exit::Closed { code, reason } => {
            tracing::info!(%conn_id, code, %reason, "closing connection");
            let _ = conn.close(code, &reason).await;
        }
    }

    state.gateway.hub().on_disconnect(conn_id).await;
    guard.disarm();
    Ok(())
}

/// Decodes one inbound frame and runs the command. Failures are reported
/// to this connection as an `error` event; the connection stays open.
async fn handle_frame<V, Z, C>(
    state: &ServerState<V, Z, C>,
    conn_id: ConnectionId,
    identity: &Identity,
    data: &[u8],
) where
    V: IdentityVerifier,
    Z: Authorizer,
    C: Codec,
{
    let hub = state.gateway.hub();

    let command = match state.codec.decode_command(data) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "failed to decode command");
            hub.send_to(
                conn_id,
                ServerEvent::error(ErrorCode::InvalidMessage, format!("Invalid message: {e}")),
            )
            .await;
            return;
        }
    };

    let result = match &command {
        ClientCommand::Ping => {
            hub.send_to(conn_id, ServerEvent::pong()).await;
            Ok(())
        }
        ClientCommand::LeaveRoom(room) => hub.leave(conn_id, room).await.map(drop),
        ClientCommand::JoinMeeting(_)
        | ClientCommand::JoinAnalysis(_)
        | ClientCommand::JoinGeneration(_)
        | ClientCommand::JoinSession(_)
        | ClientCommand::JoinBatch(_) => match command.join_target() {
            Some((kind, entity_id)) => state
                .gateway
                .join(conn_id, identity, kind, entity_id.as_str())
                .await
                .map(drop),
            None => Ok(()),
        },
    };

    if let Err(e) = result {
        tracing::debug!(%conn_id, error = %e, "command refused");
        hub.send_to(conn_id, error_event(&e)).await;
    }
}

/// The `error` event a refused room command is reported with.
fn error_event(err: &RoomError) -> ServerEvent {
    let (code, message) = match err {
        RoomError::InvalidRoom(_) => (ErrorCode::InvalidRoom, "Invalid room identifier"),
        RoomError::UnauthorizedAccess { .. } => {
            (ErrorCode::UnauthorizedAccess, "Not allowed to join this room")
        }
        RoomError::NotConnected(_) => (ErrorCode::NotConnected, "Connection is not admitted"),
    };
    ServerEvent::error(code, message)
}

#[cfg(test)]
mod tests {
    use pulsewire_protocol::{RoomName, UserId};

    use super::*;

    fn code_of(event: &ServerEvent) -> ErrorCode {
        match event {
            ServerEvent::Error(stamped) => stamped.payload.code,
            other => panic!("expected error event, got {}", other.name()),
        }
    }

    #[test]
    fn test_error_event_maps_room_errors_to_codes() {
        assert_eq!(
            code_of(&error_event(&RoomError::InvalidRoom(String::new()))),
            ErrorCode::InvalidRoom
        );
        assert_eq!(
            code_of(&error_event(&RoomError::UnauthorizedAccess {
                user_id: UserId::new("u"),
                room: RoomName::parse("meeting-1").unwrap(),
            })),
            ErrorCode::UnauthorizedAccess
        );
        assert_eq!(
            code_of(&error_event(&RoomError::NotConnected(ConnectionId::new(1)))),
            ErrorCode::NotConnected
        );
    }
}
