//! Unified error type for the Warlink stack.

use warlink_broker::{BrokerError, ConnectionError, TopologyError};
use warlink_codec::CodecError;
use warlink_pubsub::PubSubError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `warlink` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attributes auto-generate `From` impls, so the `?` operator converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WarlinkError {
    /// The broker, a connection, or a channel is unavailable.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A queue or exchange declaration failed or conflicted.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// A payload could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] CodecError),
}

impl From<BrokerError> for WarlinkError {
    fn from(error: BrokerError) -> Self {
        match error {
            BrokerError::Connection(e) => Self::Connection(e),
            BrokerError::Topology(e) => Self::Topology(e),
        }
    }
}

impl From<PubSubError> for WarlinkError {
    fn from(error: PubSubError) -> Self {
        match error {
            PubSubError::Connection(e) => Self::Connection(e),
            PubSubError::Topology(e) => Self::Topology(e),
            PubSubError::Serialization(e) => Self::Serialization(e),
        }
    }
}
