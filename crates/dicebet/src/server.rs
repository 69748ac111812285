//! `Server` builder and accept loop.
//!
//! This is the entry point for running a Dicebet server. It ties the
//! layers together: transport → protocol → service → room.

use std::net::SocketAddr;
use std::sync::Arc;

use dicebet_dice::DiceSource;
use dicebet_protocol::JsonCodec;
use dicebet_room::{DiceFactory, RoomConfig, RoomRegistry};
use dicebet_transport::{Transport, WebSocketTransport};

use crate::DicebetError;
use crate::handler::handle_connection;
use crate::service::RoomService;

/// Port used when neither `DICEBET_ADDR` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 8000;

/// Resolves the listen address: an explicit address wins, otherwise every
/// interface on `port` (or [`DEFAULT_PORT`]).
pub fn resolve_bind_addr(addr: Option<String>, port: Option<String>) -> String {
    if let Some(addr) = addr.filter(|a| !a.trim().is_empty()) {
        return addr;
    }
    let port = port
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    format!("0.0.0.0:{port}")
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) service: RoomService,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Dicebet server.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), dicebet::DicebetError> {
/// let server = dicebet::Server::builder()
///     .bind("0.0.0.0:8000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    dice: Option<DiceFactory>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            room_config: RoomConfig::default(),
            dice: None,
        }
    }

    /// Sets the address to bind to. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Replaces the dice every new room rolls with.
    pub fn dice(
        mut self,
        factory: impl Fn() -> Box<dyn DiceSource> + Send + Sync + 'static,
    ) -> Self {
        self.dice = Some(Arc::new(factory));
        self
    }

    /// Binds the listener. Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<Server, DicebetError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let mut registry = RoomRegistry::new(self.room_config);
        if let Some(factory) = self.dice {
            registry = registry.with_dice(move || factory());
        }

        let state = Arc::new(ServerState {
            service: RoomService::new(registry),
            codec: JsonCodec,
        });
        Ok(Server { transport, state })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Dicebet server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Server {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DicebetError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop, one handler task per connection.
    ///
    /// Failed handshakes are logged and skipped. Returns once the
    /// transport is shut down.
    pub async fn run(mut self) -> Result<(), DicebetError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Dicebet server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) if e.is_fatal() => {
                    tracing::info!("Dicebet server stopped");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
