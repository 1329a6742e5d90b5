//! The wire envelope: a tagged, opaque payload.

/// A payload as the broker carries it: a content-type tag identifying the
/// encoding, plus the encoded body.
///
/// Envelopes are produced by a [`Codec`](crate::Codec) on publish and
/// consumed by one on delivery. The broker never looks inside the body —
/// the tag is the only self-description a message carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Identifies the encoding of `body`, e.g. `application/json`.
    pub content_type: String,

    /// The encoded payload bytes.
    pub body: Vec<u8>,
}

impl Envelope {
    /// Creates an envelope from a tag and an already-encoded body.
    pub fn new(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            body,
        }
    }
}
