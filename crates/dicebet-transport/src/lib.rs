//! Transport layer for Dicebet.
//!
//! [`Transport`] accepts connections and [`Connection`] moves frames to
//! and from one peer. The server only talks to these traits; the
//! WebSocket implementation lives behind the `websocket` feature.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket listener via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address the listener is bound to.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;

    /// Stops accepting; later calls to `accept` fail.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One peer.
///
/// `send` and `recv` may run concurrently from different tasks: a
/// connection handler typically waits on `recv` while room events are
/// pushed out through `send_text`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends a binary frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Sends a text frame.
    async fn send_text(&self, text: &str) -> Result<(), Self::Error>;

    /// Receives the next text or binary payload.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
