//! Payload serialization for Warlink.
//!
//! This crate defines how typed values become wire payloads and back:
//!
//! - **Envelope** ([`Envelope`]) — the unit the broker actually carries:
//!   a content-type tag plus an opaque body.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how typed values are
//!   converted to and from envelope bodies.
//! - **Errors** ([`CodecError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! The codec layer knows nothing about exchanges, queues, or
//! acknowledgments — it only turns values into tagged bytes. Publishers
//! encode before any broker interaction; consumers decode after the broker
//! hands a delivery out.

mod codec;
mod envelope;
mod error;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use envelope::Envelope;
pub use error::CodecError;
