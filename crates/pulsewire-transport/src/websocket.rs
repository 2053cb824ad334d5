//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use percent_encoding::percent_decode_str;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{
    Connection, ConnectionId, Handshake, PendingConnection, Transport, TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Query parameter that may carry the credential on the upgrade URL.
const TOKEN_QUERY_PARAM: &str = "token";

/// How long a client gets to finish the HTTP upgrade.
const UPGRADE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is actually bound to.
    ///
    /// Useful when binding to port 0 and letting the OS pick.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Pending = PendingWebSocket;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::trace!(%id, %addr, "accepted TCP stream");
        Ok(PendingWebSocket { id, addr, stream })
    }
}

/// A TCP stream taken off the listener whose HTTP upgrade has not run.
pub struct PendingWebSocket {
    id: ConnectionId,
    addr: SocketAddr,
    stream: TcpStream,
}

impl PendingWebSocket {
    /// The remote address of the peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl PendingConnection for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Completes the HTTP upgrade, bounded by a fixed deadline.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let Self { id, addr, stream } = self;

        // The credential is read off the upgrade request. The callback
        // never refuses the upgrade: rejection happens after the
        // identity check, with a close frame the client can inspect.
        let mut token = None;
        let upgrade = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request,
             resp: Response|
             -> Result<Response, ErrorResponse> {
                token = extract_token(req);
                Ok(resp)
            },
        );
        let ws = tokio::time::timeout(UPGRADE_TIMEOUT, upgrade)
            .await
            .map_err(|_| {
                TransportError::UpgradeFailed(format!(
                    "{addr} did not finish the upgrade in time"
                ))
            })?
            .map_err(|e| TransportError::UpgradeFailed(e.to_string()))?;

        tracing::debug!(
            %id,
            %addr,
            has_token = token.is_some(),
            "accepted WebSocket connection"
        );

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            handshake: Handshake::new(token),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Pulls the bearer credential from the upgrade request.
///
/// `Authorization: Bearer <token>` wins over the `token` query parameter.
/// The auth scheme is matched case-insensitively. The query value is
/// percent-decoded; `+` is kept as a literal plus.
fn extract_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, t)| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if from_header.is_some() {
        return from_header;
    }

    req.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == TOKEN_QUERY_PARAM && !value.is_empty())
                .then(|| percent_decode_str(value).decode_utf8_lossy().into_owned())
        })
    })
}

/// A single WebSocket connection.
///
/// The read and write halves are locked independently so that pushing
/// events to the client never waits behind a pending read.
pub struct WebSocketConnection {
    id: ConnectionId,
    handshake: Handshake,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Sends UTF-8 payloads as text frames, anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self, code: u16, reason: &str) -> Result<(), Self::Error> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.sink
            .lock()
            .await
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
