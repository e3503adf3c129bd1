//! `PickbanServer` builder, accept loop and registry reaper.
//!
//! Ties the layers together: transport → protocol → handler → session.

use std::sync::{Arc, Weak};
use std::time::Duration;

use pickban_draft::{
    DraftRepository, Persistence, Registry, SessionConfig, SessionHandle,
};
use pickban_protocol::{Codec, JsonCodec, SessionId};
use pickban_transport::WebSocketTransport;
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{Authenticator, PickbanError, ServerConfig};

/// The protocol version this build speaks. Clients must announce it in
/// `hello` or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) registry: Arc<Mutex<Registry>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a pickban server.
///
/// # Example
///
/// ```rust,ignore
/// use pickban::prelude::*;
///
/// let server = PickbanServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .repository(Arc::new(MemoryRepository::new()))
///     .build(DevAuthenticator)
///     .await?;
/// server.run().await
/// ```
pub struct PickbanServerBuilder {
    config: ServerConfig,
    persistence: Persistence,
}

impl PickbanServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            persistence: Persistence::noop(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Settings for sessions created by `join_session` when
    /// auto-creation is on.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn auto_create_sessions(mut self, enabled: bool) -> Self {
        self.config.auto_create_sessions = enabled;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Where sessions record actions and results. Defaults to nowhere.
    pub fn repository<R: DraftRepository>(mut self, repo: Arc<R>) -> Self {
        self.persistence = Persistence::new(repo);
        self
    }

    /// Validates the config, binds the listener and returns the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<PickbanServer<A, JsonCodec>, PickbanError> {
        self.config.validate()?;
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Arc::new(Mutex::new(Registry::with_persistence(
                self.persistence,
            ))),
            auth,
            codec: JsonCodec,
            config: self.config,
        });

        Ok(PickbanServer { transport, state })
    }
}

impl Default for PickbanServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound pickban server. Call [`run()`](Self::run) to start serving.
pub struct PickbanServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
}

impl<A, C> PickbanServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The session registry. Lobby code creates sessions through it
    /// before sending players in.
    pub fn registry(&self) -> Arc<Mutex<Registry>> {
        Arc::clone(&self.state.registry)
    }

    /// Creates a session under `id`. Shorthand for locking the registry.
    pub async fn create_session(
        &self,
        id: SessionId,
        config: SessionConfig,
    ) -> Result<SessionHandle, PickbanError> {
        let handle = self.state.registry.lock().await.create(id, config)?;
        Ok(handle)
    }

    /// Runs the accept loop until the process ends.
    ///
    /// Each TCP connection gets its own task that finishes the WebSocket
    /// upgrade, performs the handshake and then serves the client.
    pub async fn run(self) -> Result<(), PickbanError> {
        tracing::info!(
            addr = %self.state.config.bind_addr,
            "pickban server running"
        );
        spawn_reaper(
            Arc::downgrade(&self.state.registry),
            self.state.config.reap_interval(),
        );

        loop {
            let pending = match self.transport.accept().await {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    continue;
                }
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let peer = pending.peer_addr();
                let upgrade = tokio::time::timeout(
                    state.config.handshake_timeout(),
                    pending.upgrade(),
                )
                .await;
                let conn = match upgrade {
                    Ok(Ok(conn)) => conn,
                    Ok(Err(e)) => {
                        tracing::debug!(%peer, error = %e, "websocket upgrade failed");
                        return;
                    }
                    Err(_) => {
                        tracing::debug!(%peer, "websocket upgrade timed out");
                        return;
                    }
                };
                if let Err(e) = handle_connection(conn, state).await {
                    tracing::debug!(%peer, error = %e, "connection ended with error");
                }
            });
        }
    }
}

/// Periodically drops retired sessions. Stops once the registry is gone.
fn spawn_reaper(registry: Weak<Mutex<Registry>>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(registry) = registry.upgrade() else {
                break;
            };
            let reaped = registry.lock().await.reap();
            if reaped > 0 {
                tracing::info!(reaped, "reaped retired sessions");
            }
        }
    });
}
