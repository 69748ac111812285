//! Error types for the room layer.

use dicebet_protocol::{PlayerId, RoomCode};

use crate::Phase;

/// Errors that can occur during room operations.
///
/// Every variant maps to a stable numeric [`code`](RoomError::code) that
/// the server puts on the wire next to the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    #[error("player {0} not in room")]
    PlayerNotFound(PlayerId),

    /// The operation is not allowed in the room's current phase.
    #[error("cannot {action} while {phase}")]
    InvalidPhase { action: &'static str, phase: Phase },

    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    #[error("not enough points: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },

    /// A per-round cap was hit (bet count, duplicate side bet).
    #[error("{0}")]
    LimitExceeded(String),

    /// A host-only action attempted by someone else.
    #[error("{0}")]
    Unauthorized(String),

    /// The room actor has stopped.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// HTTP-flavoured status code for the error kind.
    pub fn code(&self) -> u16 {
        match self {
            Self::RoomNotFound(_) | Self::PlayerNotFound(_) => 404,
            Self::InvalidPhase { .. } => 409,
            Self::Validation(_) => 400,
            Self::InsufficientFunds { .. } => 402,
            Self::LimitExceeded(_) => 429,
            Self::Unauthorized(_) => 403,
            Self::Unavailable(_) => 503,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
