//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding frames.
///
/// A `ProtocolError` always means the bytes themselves were the problem.
/// Game-rule violations are reported by the room layer instead.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, an
    /// unknown `op`, or a value of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
