//! Unified error type for the Dicebet server.

use dicebet_protocol::ProtocolError;
use dicebet_room::RoomError;
use dicebet_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// `#[from]` on each variant lets `?` lift crate errors into this one.
#[derive(Debug, thiserror::Error)]
pub enum DicebetError {
    /// Socket-level failure (bind, accept, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A game rule rejected the request.
    #[error(transparent)]
    Room(#[from] RoomError),
}
