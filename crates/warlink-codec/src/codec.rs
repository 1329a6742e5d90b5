//! Codec trait and implementations for payload serialization.

use serde::{Serialize, de::DeserializeOwned};

use crate::{CodecError, Envelope};

/// A codec that can encode typed values into envelope bodies and decode
/// them back.
///
/// `Send + Sync + 'static` because codecs travel into the background
/// consumer tasks and may be polled from any runtime thread.
///
/// The `encode`/`decode` methods are generic over the payload type; a
/// single codec instance serves every message shape a participant
/// exchanges.
pub trait Codec: Send + Sync + 'static {
    /// The content-type tag this codec stamps on envelopes.
    fn content_type(&self) -> &'static str;

    /// Serializes a value into a payload body.
    ///
    /// # Errors
    /// Returns [`CodecError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserializes a payload body back into a value.
    ///
    /// # Errors
    /// Returns [`CodecError::Decode`] if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CodecError>;

    /// Serializes a value into a complete, content-type-tagged envelope.
    fn encode_envelope<T: Serialize>(&self, value: &T) -> Result<Envelope, CodecError>
    where
        Self: Sized,
    {
        Ok(Envelope::new(self.content_type(), self.encode(value)?))
    }

    /// Decodes an envelope, checking its content-type tag first.
    ///
    /// # Errors
    /// Returns [`CodecError::ContentType`] when the envelope was produced
    /// by a different encoding, [`CodecError::Decode`] when the body
    /// doesn't parse as `T`.
    fn decode_envelope<T: DeserializeOwned>(&self, envelope: &Envelope) -> Result<T, CodecError>
    where
        Self: Sized,
    {
        if envelope.content_type != self.content_type() {
            return Err(CodecError::ContentType {
                expected: self.content_type(),
                actual: envelope.content_type.clone(),
            });
        }
        self.decode(&envelope.body)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON is the default interchange format: self-describing, easy to inspect
/// in logs, and every participant can speak it. Behind the `json` feature
/// flag (enabled by default) so embedders can swap in their own codec
/// without pulling in `serde_json`.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(body).map_err(CodecError::Decode)
    }
}

// =========================================================================
// Tests
// =========================================================================
