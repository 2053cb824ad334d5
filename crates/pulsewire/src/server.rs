//! `PulsewireServer` builder and server loop.
//!
//! This is the entry point for running a notification server. It ties
//! together all the layers: transport → protocol → session → room, and
//! hands out the [`Hub`] producers emit through.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pulsewire_protocol::{Codec, JsonCodec};
use pulsewire_room::Authorizer;
use pulsewire_session::{IdentityVerifier, SessionPolicy};
use pulsewire_transport::{Transport, WebSocketTransport};

use crate::gateway::Gateway;
use crate::handler::handle_connection;
use crate::{Hub, PulsewireError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. All mutable
/// state lives in the hub behind its own lock.
pub(crate) struct ServerState<V, Z, C> {
    pub(crate) gateway: Gateway<V, Z>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Pulsewire server.
///
/// # Example
///
/// ```rust,ignore
/// use pulsewire::prelude::*;
///
/// let server = PulsewireServer::builder()
///     .config(ServerConfig::from_env()?)
///     .build(my_verifier, my_authorizer)
///     .await?;
/// let hub = server.hub();
/// server.run().await
/// ```
#[derive(Debug, Clone, Default)]
pub struct PulsewireServerBuilder {
    config: ServerConfig,
}

impl PulsewireServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn session_policy(mut self, policy: SessionPolicy) -> Self {
        self.config.session_policy = policy;
        self
    }

    /// Binds the listener and wires the collaborators in.
    ///
    /// There is no default authorizer: pass
    /// [`AllowAll`](pulsewire_room::AllowAll) explicitly for local
    /// development. Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<V, Z>(
        self,
        verifier: V,
        authorizer: Z,
    ) -> Result<PulsewireServer<V, Z, JsonCodec>, PulsewireError>
    where
        V: IdentityVerifier,
        Z: Authorizer,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let hub = Arc::new(Hub::new(self.config.session_policy));

        let state = Arc::new(ServerState {
            gateway: Gateway::new(hub, verifier, authorizer),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(PulsewireServer { transport, state })
    }
}

/// A bound Pulsewire server.
///
/// Grab the [`hub()`](Self::hub) for producers, then call
/// [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct PulsewireServer<V, Z, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<V, Z, C>>,
}

impl PulsewireServer<(), (), ()> {
    /// Creates a new builder.
    pub fn builder() -> PulsewireServerBuilder {
        PulsewireServerBuilder::new()
    }
}

impl<V, Z, C> PulsewireServer<V, Z, C>
where
    V: IdentityVerifier,
    Z: Authorizer,
    C: Codec,
{
    /// The hub producers emit events through. Stays usable after the
    /// server is consumed by `run`.
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(self.state.gateway.hub())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), PulsewireError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `signal` resolves, then shuts the hub
    /// down: every connection is closed with "Server shutting down" and
    /// all state is cleared.
    pub async fn run_until(
        mut self,
        signal: impl Future<Output = ()>,
    ) -> Result<(), PulsewireError> {
        tracing::info!(
            addr = %self.state.config.bind_addr,
            policy = ?self.state.config.session_policy,
            "Pulsewire server running"
        );
        tokio::pin!(signal);

        loop {
            tokio::select! {
                () = &mut signal => break,
                // Only the TCP accept runs here; the upgrade happens on
                // the connection's own task.
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutdown signal received");
        self.state.gateway.hub().shutdown().await;
        Ok(())
    }
}
