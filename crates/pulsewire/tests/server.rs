//! Integration tests for the Pulsewire server, handler, and full connection flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pulsewire::prelude::*;
use pulsewire::{
    CLOSE_AUTH_FAILED, CLOSE_AUTH_REQUIRED, CLOSE_GOING_AWAY, CLOSE_IDLE_TIMEOUT,
    CLOSE_SESSION_REPLACED,
};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

// =========================================================================
// Test collaborators
// =========================================================================

/// Accepts `user-<id>` tokens.
struct TestVerifier;

impl IdentityVerifier for TestVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
        token
            .strip_prefix("user-")
            .map(Identity::new)
            .ok_or_else(|| VerifyError::InvalidToken("unknown token".into()))
    }
}

/// Lets everyone follow everything except entity `forbidden`.
struct DenyForbidden;

impl Authorizer for DenyForbidden {
    async fn can_join(&self, _: &Identity, _: RoomKind, entity_id: &str) -> bool {
        entity_id != "forbidden"
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    addr: String,
    hub: Arc<Hub>,
    stop: Option<oneshot::Sender<()>>,
}

async fn start_server_with(config: ServerConfig) -> TestServer {
    let server = PulsewireServer::builder()
        .config(config)
        .bind("127.0.0.1:0")
        .build(TestVerifier, DenyForbidden)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let hub = server.hub();

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = server
            .run_until(async {
                let _ = stopped.await;
            })
            .await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer {
        addr,
        hub,
        stop: Some(stop),
    }
}

async fn start_server() -> TestServer {
    start_server_with(ServerConfig::default()).await
}

async fn connect_raw(addr: &str, query: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/{query}"))
        .await
        .expect("should connect");
    ws
}

/// Connects as `user-<user>` and consumes the `connected` event.
async fn connect_as(addr: &str, user: &str) -> ClientWs {
    let mut ws = connect_raw(addr, &format!("?token=user-{user}")).await;
    let connected = recv_json(&mut ws).await;
    assert_eq!(connected["event"], "connected");
    ws
}

/// Reads the next text frame as JSON.
async fn recv_json(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("should receive within timeout")
            .expect("stream should not end")
            .expect("should not error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("valid JSON");
            }
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// Waits for the server's close frame and returns its code and reason.
async fn recv_close(ws: &mut ClientWs) -> (u16, String) {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("should receive within timeout")
            .expect("stream should not end")
            .expect("should not error");
        match msg {
            Message::Close(Some(frame)) => {
                return (u16::from(frame.code), frame.reason.to_string());
            }
            Message::Close(None) => panic!("close frame without code"),
            _ => continue,
        }
    }
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("send should succeed");
}

async fn join(ws: &mut ClientWs, command: &str, id: Value) -> Value {
    send_json(ws, json!({ "event": command, "data": id })).await;
    recv_json(ws).await
}

/// Polls `check` until it holds or two seconds pass.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn analysis_progress(meeting_id: &str, progress: f64) -> AnalysisProgress {
    AnalysisProgress {
        meeting_id: meeting_id.into(),
        analysis_id: "a1".into(),
        progress,
        stage: "moment-detection".into(),
        message: "Detecting key moments".into(),
        moments_found: None,
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_connect_without_token_closes_with_authentication_required() {
    let server = start_server().await;
    let mut ws = connect_raw(&server.addr, "").await;

    let (code, reason) = recv_close(&mut ws).await;
    assert_eq!(code, CLOSE_AUTH_REQUIRED);
    assert!(reason.contains("Authentication required"), "{reason}");
    assert_eq!(server.hub.connection_count().await, 0);
}

#[tokio::test]
async fn test_connect_with_bad_token_closes_with_authentication_failed() {
    let server = start_server().await;
    let mut ws = connect_raw(&server.addr, "?token=not-a-user").await;

    let (code, reason) = recv_close(&mut ws).await;
    assert_eq!(code, CLOSE_AUTH_FAILED);
    assert!(reason.contains("Authentication failed"), "{reason}");
    assert_eq!(server.hub.connected_user_count().await, 0);
}

#[tokio::test]
async fn test_connect_with_bearer_header_is_admitted() {
    let server = start_server().await;
    let mut request = format!("ws://{}/", server.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("Authorization", "Bearer user-alice".parse().unwrap());
    let (mut ws, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    let connected = recv_json(&mut ws).await;
    assert_eq!(connected["event"], "connected");
    assert_eq!(connected["data"]["userId"], "alice");
    assert!(connected["data"]["connectionId"].is_u64());
    assert!(server.hub.is_user_connected(&UserId::new("alice")).await);
}

#[tokio::test]
async fn test_silent_tcp_peer_does_not_delay_other_clients() {
    let server = start_server().await;

    // Never sends an upgrade request; holds its socket open.
    let _silent = tokio::net::TcpStream::connect(&server.addr)
        .await
        .expect("tcp connect");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut ws = tokio::time::timeout(Duration::from_secs(2), connect_as(&server.addr, "alice"))
        .await
        .expect("client should be admitted while another peer is silent");

    send_json(&mut ws, json!({ "event": "ping" })).await;
    assert_eq!(recv_json(&mut ws).await["event"], "pong");
    assert!(server.hub.is_user_connected(&UserId::new("alice")).await);
    assert_eq!(server.hub.connection_count().await, 1);
}

// =========================================================================
// Rooms and events
// =========================================================================

#[tokio::test]
async fn test_join_meeting_then_emit_delivers_stamped_progress() {
    let server = start_server().await;
    let mut ws = connect_as(&server.addr, "alice").await;

    let ack = join(&mut ws, "join-meeting", json!("123")).await;
    assert_eq!(ack["event"], "room-joined");
    assert_eq!(ack["data"]["room"], "meeting-123");

    let delivered = server
        .hub
        .emit_analysis_progress(analysis_progress("123", 65.0))
        .await;
    assert_eq!(delivered, 1);

    let event = recv_json(&mut ws).await;
    assert_eq!(event["event"], "analysis-progress");
    assert_eq!(event["data"]["meetingId"], "123");
    assert_eq!(event["data"]["progress"], 65.0);
    let stamp = event["data"]["timestamp"].as_str().expect("timestamp");
    assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok(), "{stamp}");
}

#[tokio::test]
async fn test_join_with_numeric_id_uses_same_room() {
    let server = start_server().await;
    let mut ws = connect_as(&server.addr, "alice").await;

    let ack = join(&mut ws, "join-batch", json!(42)).await;
    assert_eq!(ack["data"]["room"], "batch-42");

    server.hub.emit_batch_error("42", "worker crashed").await;
    let event = recv_json(&mut ws).await;
    assert_eq!(event["event"], "batch-error");
    assert_eq!(event["data"]["error"], "worker crashed");
}

#[tokio::test]
async fn test_join_blank_id_returns_invalid_room_and_keeps_connection() {
    let server = start_server().await;
    let mut ws = connect_as(&server.addr, "alice").await;

    let error = join(&mut ws, "join-meeting", json!("   ")).await;
    assert_eq!(error["event"], "error");
    assert_eq!(error["data"]["code"], "INVALID_ROOM");

    send_json(&mut ws, json!({ "event": "ping" })).await;
    assert_eq!(recv_json(&mut ws).await["event"], "pong");
    assert!(server.hub.rooms_of_user(&UserId::new("alice")).await.is_empty());
}

#[tokio::test]
async fn test_join_forbidden_entity_returns_unauthorized_access() {
    let server = start_server().await;
    let mut ws = connect_as(&server.addr, "mallory").await;

    let error = join(&mut ws, "join-analysis", json!("forbidden")).await;
    assert_eq!(error["event"], "error");
    assert_eq!(error["data"]["code"], "UNAUTHORIZED_ACCESS");
    assert!(server.hub.members_of_room("analysis-forbidden").await.is_empty());
}

#[tokio::test]
async fn test_malformed_frame_returns_invalid_message() {
    let server = start_server().await;
    let mut ws = connect_as(&server.addr, "alice").await;

    ws.send(Message::text("{not json")).await.unwrap();
    let error = recv_json(&mut ws).await;
    assert_eq!(error["data"]["code"], "INVALID_MESSAGE");

    send_json(&mut ws, json!({ "event": "join-everything", "data": "1" })).await;
    let error = recv_json(&mut ws).await;
    assert_eq!(error["data"]["code"], "INVALID_MESSAGE");
}

#[tokio::test]
async fn test_leave_room_stops_delivery() {
    let server = start_server().await;
    let mut ws = connect_as(&server.addr, "alice").await;
    join(&mut ws, "join-generation", json!("g1")).await;

    send_json(&mut ws, json!({ "event": "leave-room", "data": "generation-g1" })).await;
    let ack = recv_json(&mut ws).await;
    assert_eq!(ack["event"], "room-left");

    assert_eq!(
        server.hub.emit_generation_error("g1", "cancelled").await,
        0
    );
}

#[tokio::test]
async fn test_two_users_in_room_both_receive_event() {
    let server = start_server().await;
    let mut alice = connect_as(&server.addr, "alice").await;
    let mut bob = connect_as(&server.addr, "bob").await;
    join(&mut alice, "join-session", json!("s1")).await;
    join(&mut bob, "join-session", json!("s1")).await;

    let members = server.hub.members_of_room("session-s1").await;
    assert_eq!(members.len(), 2);

    let delivered = server
        .hub
        .emit_coaching_hint(CoachingHint {
            session_id: "s1".into(),
            hint: "Ask an open question".into(),
            category: "discovery".into(),
            priority: HintPriority::Medium,
        })
        .await;
    assert_eq!(delivered, 2);

    for ws in [&mut alice, &mut bob] {
        let event = recv_json(ws).await;
        assert_eq!(event["event"], "coaching-hint");
        assert_eq!(event["data"]["priority"], "medium");
    }
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_client_close_purges_rooms_and_session() {
    let server = start_server().await;
    let mut ws = connect_as(&server.addr, "alice").await;
    join(&mut ws, "join-meeting", json!("1")).await;
    join(&mut ws, "join-batch", json!("2")).await;

    ws.close(None).await.unwrap();

    let hub = Arc::clone(&server.hub);
    assert!(
        eventually(|| {
            let hub = Arc::clone(&hub);
            async move { hub.connected_user_count().await == 0 }
        })
        .await
    );
    assert_eq!(server.hub.room_count().await, 0);
    assert!(server.hub.rooms_of_user(&UserId::new("alice")).await.is_empty());
    assert_eq!(server.hub.emit_batch_error("2", "late").await, 0);
}

#[tokio::test]
async fn test_second_tab_keeps_user_connected_after_first_closes() {
    let server = start_server().await;
    let mut first = connect_as(&server.addr, "alice").await;
    let _second = connect_as(&server.addr, "alice").await;
    assert_eq!(server.hub.connection_count().await, 2);
    assert_eq!(server.hub.connected_user_count().await, 1);

    first.close(None).await.unwrap();

    let hub = Arc::clone(&server.hub);
    assert!(
        eventually(|| {
            let hub = Arc::clone(&hub);
            async move { hub.connection_count().await == 1 }
        })
        .await
    );
    assert!(server.hub.is_user_connected(&UserId::new("alice")).await);
}

#[tokio::test]
async fn test_single_connection_policy_closes_previous_session() {
    let config = ServerConfig {
        session_policy: SessionPolicy::SingleConnection,
        ..ServerConfig::default()
    };
    let server = start_server_with(config).await;
    let mut first = connect_as(&server.addr, "alice").await;
    join(&mut first, "join-meeting", json!("7")).await;

    let _second = connect_as(&server.addr, "alice").await;

    let (code, reason) = recv_close(&mut first).await;
    assert_eq!(code, CLOSE_SESSION_REPLACED);
    assert_eq!(reason, "Session replaced");
    assert_eq!(server.hub.connection_count().await, 1);
    assert!(server.hub.members_of_room("meeting-7").await.is_empty());
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let config = ServerConfig {
        idle_timeout: Duration::from_millis(200),
        ..ServerConfig::default()
    };
    let server = start_server_with(config).await;
    let mut ws = connect_as(&server.addr, "alice").await;

    let (code, _) = recv_close(&mut ws).await;
    assert_eq!(code, CLOSE_IDLE_TIMEOUT);

    let hub = Arc::clone(&server.hub);
    assert!(
        eventually(|| {
            let hub = Arc::clone(&hub);
            async move { hub.connection_count().await == 0 }
        })
        .await
    );
}

#[tokio::test]
async fn test_shutdown_signal_closes_connections_and_clears_state() {
    let mut server = start_server().await;
    let mut ws = connect_as(&server.addr, "alice").await;
    join(&mut ws, "join-meeting", json!("1")).await;

    server.stop.take().unwrap().send(()).unwrap();

    let (code, reason) = recv_close(&mut ws).await;
    assert_eq!(code, CLOSE_GOING_AWAY);
    assert!(reason.contains("shutting down"), "{reason}");
    assert_eq!(server.hub.connection_count().await, 0);
    assert_eq!(server.hub.room_count().await, 0);
}
