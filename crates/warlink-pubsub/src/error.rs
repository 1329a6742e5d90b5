//! Error types for the publish/subscribe layer.

use warlink_broker::{BrokerError, ConnectionError, TopologyError};
use warlink_codec::CodecError;

/// Errors surfaced by publish and subscription setup.
///
/// Setup-time failures propagate here synchronously. Per-delivery decode
/// failures do not appear: they are contained inside the consumer loop,
/// which dead-letters the offending message and keeps consuming.
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    /// The broker connection or channel is unavailable.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Queue or binding declaration failed or conflicts with an existing
    /// declaration.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The payload could not be encoded; the broker was never contacted.
    #[error(transparent)]
    Serialization(#[from] CodecError),
}

impl From<BrokerError> for PubSubError {
    fn from(error: BrokerError) -> Self {
        match error {
            BrokerError::Connection(e) => Self::Connection(e),
            BrokerError::Topology(e) => Self::Topology(e),
        }
    }
}
