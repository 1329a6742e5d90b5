//! Queue topology: durability classes and subscription descriptors.

use warlink_broker::{Channel, Connection, Queue, QueueOptions};

use crate::PubSubError;

/// The durability class of a subscription's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// The queue survives its consumers being absent for stretches of
    /// time: shared, never exclusive, never auto-deleted. Used where
    /// messages must not be lost while nobody is listening (aggregated
    /// game logs).
    Durable,

    /// The queue belongs to one session: exclusive to the declaring
    /// connection and deleted when that connection closes. Used for
    /// per-player subscriptions (a pause channel, an inbound move stream).
    Transient,
}

impl Durability {
    /// The broker-level declaration this class stands for. Total by
    /// construction: a durable queue is never exclusive or auto-deleted,
    /// a transient queue is always both.
    pub fn queue_options(self, dead_letter_exchange: &str) -> QueueOptions {
        match self {
            Self::Durable => QueueOptions {
                durable: true,
                exclusive: false,
                auto_delete: false,
                dead_letter_exchange: Some(dead_letter_exchange.to_string()),
            },
            Self::Transient => QueueOptions {
                durable: false,
                exclusive: true,
                auto_delete: true,
                dead_letter_exchange: Some(dead_letter_exchange.to_string()),
            },
        }
    }
}

/// Everything a subscription declares on the broker: the queue, its
/// binding, and its dead-letter target.
///
/// The queue name is the identity key; materializing the same descriptor
/// twice is idempotent, while a conflicting re-declaration of the same
/// queue name fails loudly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// The exchange the queue is bound to.
    pub exchange: String,
    /// The queue's name.
    pub queue_name: String,
    /// The binding's routing key. On topic exchanges this may use the
    /// wildcard segments `*` and `#`.
    pub routing_key: String,
    /// The queue's durability class.
    pub durability: Durability,
    /// The exchange that receives messages this queue discards.
    pub dead_letter_exchange: String,
}

impl Topology {
    /// Creates a descriptor.
    pub fn new(
        exchange: impl Into<String>,
        queue_name: impl Into<String>,
        routing_key: impl Into<String>,
        durability: Durability,
        dead_letter_exchange: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            queue_name: queue_name.into(),
            routing_key: routing_key.into(),
            durability,
            dead_letter_exchange: dead_letter_exchange.into(),
        }
    }
}

/// Materializes a topology descriptor on the broker: opens a channel,
/// declares the queue with its durability class and dead-letter target,
/// and binds it to the exchange under the routing key.
///
/// Safe to call once per subscription setup; idempotent for identical
/// parameters.
///
/// # Errors
/// [`PubSubError::Topology`] when the declaration conflicts with an
/// existing queue or names an unknown exchange;
/// [`PubSubError::Connection`] when the broker is unavailable.
pub async fn ensure_queue(
    conn: &Connection,
    topology: &Topology,
) -> Result<(Channel, Queue), PubSubError> {
    let mut channel = conn.open_channel();
    let options = topology
        .durability
        .queue_options(&topology.dead_letter_exchange);
    let queue = channel.queue_declare(&topology.queue_name, options).await?;
    channel
        .queue_bind(&topology.queue_name, &topology.exchange, &topology.routing_key)
        .await?;
    tracing::debug!(
        queue = %topology.queue_name,
        exchange = %topology.exchange,
        key = %topology.routing_key,
        "topology ensured"
    );
    Ok((channel, queue))
}

// =========================================================================
// Tests
// =========================================================================
