//! Error types for dice and odds lookups.

/// Errors produced while building rolls or parsing bet descriptors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiceError {
    /// A die face outside 1–6.
    #[error("die face must be 1-6, got {0}")]
    InvalidFace(u8),

    /// A side-bet name that is not in the fixed set.
    #[error("unknown side bet type: {0:?}")]
    UnknownSideBet(String),
}
