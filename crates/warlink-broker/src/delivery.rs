//! Deliveries and their acknowledgment handles.

use tokio::sync::mpsc;
use warlink_codec::Envelope;

use crate::error::ConnectionError;
use crate::queue::QueueCommand;

/// One broker-delivered message instance.
///
/// Every delivery requires exactly one acknowledgment resolution, and the
/// API enforces it: [`ack`](Self::ack) and [`nack`](Self::nack) consume
/// the delivery, so a second call does not compile, and the owning task
/// either resolves it or drops it (in which case the queue requeues the
/// message once it notices the consumer is gone).
#[derive(Debug)]
pub struct Delivery {
    delivery_tag: u64,
    /// The routing key the message was published under.
    pub routing_key: String,
    /// Whether this message has been delivered before (ack was negative
    /// with requeue, or a previous consumer died holding it).
    pub redelivered: bool,
    /// The content-type-tagged payload.
    pub envelope: Envelope,
    acker: Acker,
}

impl Delivery {
    pub(crate) fn new(
        delivery_tag: u64,
        routing_key: String,
        redelivered: bool,
        envelope: Envelope,
        queue: mpsc::WeakUnboundedSender<QueueCommand>,
    ) -> Self {
        Self {
            delivery_tag,
            routing_key,
            redelivered,
            envelope,
            acker: Acker { queue },
        }
    }

    /// The queue-scoped tag identifying this delivery.
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// Positively acknowledges the delivery: the broker removes the message
    /// from the queue for good.
    pub fn ack(self) -> Result<(), ConnectionError> {
        self.acker.resolve(QueueCommand::Ack {
            delivery_tag: self.delivery_tag,
        })
    }

    /// Negatively acknowledges the delivery.
    ///
    /// With `requeue` the broker returns the message to the queue and will
    /// deliver it again, flagged `redelivered`. Without it the message is
    /// routed to the queue's dead-letter exchange instead of being deleted
    /// silently.
    pub fn nack(self, requeue: bool) -> Result<(), ConnectionError> {
        self.acker.resolve(QueueCommand::Nack {
            delivery_tag: self.delivery_tag,
            requeue,
        })
    }
}

/// The write-half of a delivery: a handle back to the owning queue actor.
///
/// Weak, so an unresolved delivery does not keep a deleted queue's actor
/// alive; resolving against a gone queue reports [`ConnectionError::QueueGone`].
#[derive(Debug)]
struct Acker {
    queue: mpsc::WeakUnboundedSender<QueueCommand>,
}

impl Acker {
    fn resolve(&self, command: QueueCommand) -> Result<(), ConnectionError> {
        self.queue
            .upgrade()
            .ok_or(ConnectionError::QueueGone)?
            .send(command)
            .map_err(|_| ConnectionError::QueueGone)
    }
}
