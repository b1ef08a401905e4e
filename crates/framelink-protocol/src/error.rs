//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means "this value is not the message we
//! expected": either it failed the structural envelope check, or its
//! `data` didn't match the shape its `type` promises.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The inbound value is not a `{ type, data }` envelope.
    #[error("invalid data transfer: {0}")]
    InvalidEnvelope(String),

    /// A typed message could not be turned into a plain value.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The envelope's `data` doesn't have the shape its `type` requires.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
