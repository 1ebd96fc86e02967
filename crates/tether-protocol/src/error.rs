//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire frames.
///
/// Each crate in Tether defines its own error enum, so a `ProtocolError`
/// always points at serialization rather than networking or sessions.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed JSON, an empty frame, or a
    /// non-string event name.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
