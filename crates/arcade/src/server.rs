//! `ArcadeServer` builder and server loop.
//!
//! This is the entry point for running an Arcade server. It ties together
//! all the layers: transport → protocol → router → rooms.

use std::sync::Arc;
use std::time::Duration;

use arcade_protocol::JsonCodec;
use arcade_room::{spawn_sweeper, LobbyConfig, RoomManager};
use arcade_transport::{Transport, WebSocketTransport};
use tokio::task::JoinHandle;

use crate::handler::{handle_connection, Limits};
use crate::{ArcadeError, Router, ServerConfig};

/// Builder for configuring and starting an Arcade server.
///
/// # Example
///
/// ```rust,ignore
/// use arcade::prelude::*;
///
/// let server = ArcadeServer::builder()
///     .bind("0.0.0.0:8080")
///     .idle_timeout(Duration::from_secs(60))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ArcadeServerBuilder {
    config: ServerConfig,
}

impl ArcadeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Starts from a complete configuration, e.g. [`ServerConfig::from_env`].
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Sets room, matchmaking, and sweeper timings.
    pub fn lobby_config(mut self, lobby: LobbyConfig) -> Self {
        self.config.lobby = lobby;
        self
    }

    /// Sets how long a connection outside any room may go without
    /// traffic before it is closed.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets how long a client may take to finish the WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<ArcadeServer, ArcadeError> {
        let transport = WebSocketTransport::bind(&self.config.bind).await?;
        let manager = Arc::new(RoomManager::new(self.config.lobby));
        Ok(ArcadeServer {
            transport,
            router: Arc::new(Router::new(manager)),
            limits: Limits {
                handshake: self.config.handshake_timeout,
                idle: self.config.idle_timeout,
            },
        })
    }
}

impl Default for ArcadeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Arcade server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ArcadeServer {
    transport: WebSocketTransport,
    router: Arc<Router<JsonCodec>>,
    limits: Limits,
}

/// Stops the sweeper when the accept loop goes away.
struct SweeperGuard(JoinHandle<()>);

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl ArcadeServer {
    /// Creates a new builder.
    pub fn builder() -> ArcadeServerBuilder {
        ArcadeServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The room manager behind this server.
    pub fn manager(&self) -> &Arc<RoomManager> {
        self.router.manager()
    }

    /// Runs the sweeper and the accept loop.
    ///
    /// Spawns a handler task for each accepted socket; the WebSocket
    /// handshake runs there, not in this loop. Runs until the process is
    /// terminated; a failed accept is logged and skipped.
    pub async fn run(mut self) -> Result<(), ArcadeError> {
        let _sweeper = SweeperGuard(spawn_sweeper(Arc::clone(self.router.manager())));
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Arcade server running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let router = Arc::clone(&self.router);
                    let limits = self.limits;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(incoming, router, limits).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
