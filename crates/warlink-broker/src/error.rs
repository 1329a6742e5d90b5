//! Error types for the broker layer.
//!
//! Setup-time failures split into two families: [`ConnectionError`] (the
//! broker or a handle to it is unavailable) and [`TopologyError`] (a
//! declaration failed or conflicts with an existing one). [`BrokerError`]
//! wraps both so channel operations return a single type while callers can
//! still match on the family.

use crate::exchange::ExchangeKind;

/// The broker, or the path to it, is unavailable.
///
/// Not locally recoverable — the caller decides whether to reconnect.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The broker actor is no longer running.
    #[error("broker is no longer running")]
    BrokerClosed,

    /// The operation used a connection that has been closed.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The queue backing a delivery was deleted before the delivery was
    /// resolved.
    #[error("queue was deleted before the delivery was resolved")]
    QueueGone,
}

/// A queue or exchange declaration failed or conflicts with an existing
/// declaration. Fatal at subscription setup time.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// The named exchange has not been declared.
    #[error("exchange {0} has not been declared")]
    UnknownExchange(String),

    /// The named queue has not been declared.
    #[error("queue {0} has not been declared")]
    UnknownQueue(String),

    /// The exchange exists with a different kind. Re-declaring with the
    /// same kind is idempotent; changing the kind is a configuration error.
    #[error("exchange {name} is already declared as a {existing} exchange")]
    ExchangeConflict {
        /// The exchange name.
        name: String,
        /// The kind it was originally declared with.
        existing: ExchangeKind,
    },

    /// The queue exists with different parameters. Re-declaring with
    /// identical parameters is idempotent; anything else is surfaced, never
    /// silently coerced.
    #[error("queue {name} is already declared with conflicting parameters")]
    QueueConflict {
        /// The queue name.
        name: String,
    },

    /// The queue is exclusive to a different connection.
    #[error("queue {0} is exclusive to another connection")]
    Exclusive(String),

    /// The queue already has an active consumer.
    #[error("queue {0} already has an active consumer")]
    ConsumerBusy(String),
}

/// Top-level error for channel operations, wrapping both failure families.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker or connection is unavailable.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A declaration failed or conflicted.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}
