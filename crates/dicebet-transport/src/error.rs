/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or accepting a TCP stream failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A TCP stream connected but never completed the WebSocket upgrade.
    /// Only that one peer is affected; the listener keeps running.
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Whether the listener itself is unusable, as opposed to one peer
    /// misbehaving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}
