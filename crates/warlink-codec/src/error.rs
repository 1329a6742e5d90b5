//! Error types for the codec layer.

/// Errors that can occur while encoding or decoding payloads.
///
/// Encode errors are returned to the publisher before any broker
/// interaction takes place. Decode errors surface on the consumer side,
/// where the delivery loop decides what to do with the un-decodable
/// message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed (turning a value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes back into a value).
    ///
    /// Common causes: malformed payloads, missing fields, or a message
    /// published with a different type than the consumer expects.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The delivery's content-type tag doesn't match this codec.
    #[error("content type mismatch: expected {expected}, got {actual}")]
    ContentType {
        /// The tag this codec produces and understands.
        expected: &'static str,
        /// The tag found on the delivery.
        actual: String,
    },
}
