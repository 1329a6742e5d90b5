//! Queue actor: an isolated Tokio task that owns one queue's messages.
//!
//! Each queue runs in its own task, communicating with the broker actor
//! and with consumers through channels. The actor owns the ready backlog
//! (FIFO), the unacked map, and at most one consumer slot; nothing else
//! ever touches them, so there is no shared mutable state to lock.

use std::collections::{HashMap, VecDeque};

use tokio::sync::{mpsc, oneshot};
use warlink_codec::Envelope;

use crate::broker::BrokerCommand;
use crate::delivery::Delivery;
use crate::error::{BrokerError, TopologyError};

/// Declaration parameters for a queue.
///
/// Equality over the whole set is the idempotency criterion: re-declaring
/// a queue with an equal `QueueOptions` succeeds, anything else conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueOptions {
    /// The queue outlives the connections that use it and is never
    /// auto-deleted.
    pub durable: bool,

    /// Only the declaring connection may declare, consume from, or keep
    /// this queue alive.
    pub exclusive: bool,

    /// The queue is deleted when its declaring connection closes.
    pub auto_delete: bool,

    /// Exchange that receives messages this queue discards (negative
    /// acknowledgment without requeue), under their original routing key.
    pub dead_letter_exchange: Option<String>,
}

/// A queue descriptor with a snapshot of its counters, as returned by
/// declaration and introspection.
#[derive(Debug, Clone)]
pub struct Queue {
    /// The queue name (its identity).
    pub name: String,
    /// Messages waiting to be delivered.
    pub messages_ready: usize,
    /// Messages delivered but not yet acknowledged.
    pub messages_unacked: usize,
    /// Active consumers (0 or 1).
    pub consumers: usize,
}

/// A message as it sits in a queue.
#[derive(Debug, Clone)]
pub(crate) struct QueuedMessage {
    pub routing_key: String,
    pub envelope: Envelope,
    pub redelivered: bool,
}

/// Commands sent to a queue actor through its channel.
pub(crate) enum QueueCommand {
    /// A routed message to enqueue at the tail.
    Deposit(QueuedMessage),

    /// Attach a consumer; replies with the delivery stream.
    Consume {
        tag: String,
        buffer: usize,
        reply: oneshot::Sender<Result<mpsc::Receiver<Delivery>, BrokerError>>,
    },

    /// Detach the consumer with the given tag.
    Cancel { tag: String },

    /// Positive acknowledgment for an outstanding delivery.
    Ack { delivery_tag: u64 },

    /// Negative acknowledgment; requeues or dead-letters the message.
    Nack { delivery_tag: u64, requeue: bool },

    /// Request the queue descriptor with current counters.
    Describe {
        reply: oneshot::Sender<Result<Queue, BrokerError>>,
    },

    /// Delete the queue; drops all messages and ends the delivery stream.
    Delete,
}

/// Spawns a queue actor and returns its command sender.
///
/// `broker` is a weak handle back to the broker actor, used only to
/// republish dead-lettered messages; weak so queue actors never keep the
/// broker alive on their own.
pub(crate) fn spawn_queue(
    name: String,
    options: QueueOptions,
    broker: mpsc::WeakSender<BrokerCommand>,
) -> mpsc::UnboundedSender<QueueCommand> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let actor = QueueActor {
        name,
        options,
        receiver,
        self_tx: sender.downgrade(),
        broker,
        ready: VecDeque::new(),
        unacked: HashMap::new(),
        next_delivery_tag: 1,
        consumer: None,
    };
    tokio::spawn(actor.run());
    sender
}

/// The attached consumer: its tag and the sending half of its bounded
/// delivery stream.
struct ConsumerSlot {
    tag: String,
    sender: mpsc::Sender<Delivery>,
}

struct QueueActor {
    name: String,
    options: QueueOptions,
    receiver: mpsc::UnboundedReceiver<QueueCommand>,
    /// Handed to deliveries so their acknowledgments come back here. Weak,
    /// so the actor's own receiver closes once the broker lets go of the
    /// queue.
    self_tx: mpsc::WeakUnboundedSender<QueueCommand>,
    broker: mpsc::WeakSender<BrokerCommand>,
    ready: VecDeque<QueuedMessage>,
    unacked: HashMap<u64, QueuedMessage>,
    next_delivery_tag: u64,
    consumer: Option<ConsumerSlot>,
}

impl QueueActor {
    async fn run(mut self) {
        tracing::debug!(queue = %self.name, "queue actor started");

        loop {
            let deliverable = self.consumer.is_some() && !self.ready.is_empty();
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
                slot = next_delivery_slot(&self.consumer), if deliverable => match slot {
                    Ok(permit) => self.deliver(permit),
                    Err(_) => {
                        // The consumer dropped its stream without cancelling;
                        // its outstanding deliveries go back on the queue.
                        tracing::debug!(queue = %self.name, "consumer stream dropped");
                        self.consumer = None;
                        self.requeue_unacked();
                    }
                },
            }
        }

        tracing::debug!(queue = %self.name, "queue actor stopped");
    }

    /// Handles one command. Returns `true` when the queue should shut down.
    async fn handle_command(&mut self, command: QueueCommand) -> bool {
        match command {
            QueueCommand::Deposit(message) => {
                self.ready.push_back(message);
            }

            QueueCommand::Consume { tag, buffer, reply } => {
                if self.consumer.is_some() {
                    let _ = reply.send(Err(TopologyError::ConsumerBusy(self.name.clone()).into()));
                    return false;
                }
                // Anything a previous consumer left unacked belongs to the
                // new one, redelivered.
                self.requeue_unacked();
                let (sender, receiver) = mpsc::channel(buffer);
                self.consumer = Some(ConsumerSlot { tag, sender });
                let _ = reply.send(Ok(receiver));
                tracing::debug!(queue = %self.name, "consumer attached");
            }

            QueueCommand::Cancel { tag } => {
                if self.consumer.as_ref().is_some_and(|slot| slot.tag == tag) {
                    self.consumer = None;
                    tracing::debug!(queue = %self.name, %tag, "consumer cancelled");
                }
            }

            QueueCommand::Ack { delivery_tag } => {
                if self.unacked.remove(&delivery_tag).is_some() {
                    tracing::trace!(queue = %self.name, delivery_tag, "delivery acked");
                } else {
                    tracing::trace!(queue = %self.name, delivery_tag, "ack for unknown tag");
                }
            }

            QueueCommand::Nack {
                delivery_tag,
                requeue,
            } => match self.unacked.remove(&delivery_tag) {
                Some(mut message) if requeue => {
                    message.redelivered = true;
                    self.ready.push_front(message);
                    tracing::trace!(queue = %self.name, delivery_tag, "delivery requeued");
                }
                Some(message) => {
                    tracing::trace!(queue = %self.name, delivery_tag, "delivery discarded");
                    self.dead_letter(message).await;
                }
                None => {
                    tracing::trace!(queue = %self.name, delivery_tag, "nack for unknown tag");
                }
            },

            QueueCommand::Describe { reply } => {
                let _ = reply.send(Ok(Queue {
                    name: self.name.clone(),
                    messages_ready: self.ready.len(),
                    messages_unacked: self.unacked.len(),
                    consumers: usize::from(self.consumer.is_some()),
                }));
            }

            QueueCommand::Delete => return true,
        }

        false
    }

    /// Moves the head of the ready queue into the reserved consumer slot.
    fn deliver(&mut self, permit: mpsc::OwnedPermit<Delivery>) {
        let Some(message) = self.ready.pop_front() else {
            return;
        };
        let delivery_tag = self.next_delivery_tag;
        self.next_delivery_tag += 1;
        self.unacked.insert(delivery_tag, message.clone());
        permit.send(Delivery::new(
            delivery_tag,
            message.routing_key,
            message.redelivered,
            message.envelope,
            self.self_tx.clone(),
        ));
        tracing::trace!(queue = %self.name, delivery_tag, "delivery dispatched");
    }

    /// Returns every unacked message to the front of the ready queue,
    /// flagged as redelivered, preserving delivery order.
    fn requeue_unacked(&mut self) {
        if self.unacked.is_empty() {
            return;
        }
        let mut leftovers: Vec<(u64, QueuedMessage)> = self.unacked.drain().collect();
        leftovers.sort_by_key(|(delivery_tag, _)| *delivery_tag);
        let count = leftovers.len();
        for (_, mut message) in leftovers.into_iter().rev() {
            message.redelivered = true;
            self.ready.push_front(message);
        }
        tracing::debug!(queue = %self.name, count, "unacked deliveries requeued");
    }

    /// Routes a discarded message to the queue's dead-letter exchange under
    /// its original routing key.
    async fn dead_letter(&self, message: QueuedMessage) {
        let Some(exchange) = self.options.dead_letter_exchange.clone() else {
            tracing::debug!(
                queue = %self.name,
                key = %message.routing_key,
                "discarded with no dead-letter exchange configured"
            );
            return;
        };
        let Some(broker) = self.broker.upgrade() else {
            tracing::warn!(queue = %self.name, "broker gone, dropping dead-lettered message");
            return;
        };
        let command = BrokerCommand::Publish {
            exchange,
            routing_key: message.routing_key,
            envelope: message.envelope,
            reply: None,
        };
        if broker.send(command).await.is_err() {
            tracing::warn!(queue = %self.name, "broker gone, dropping dead-lettered message");
        }
    }
}

/// Waits for capacity in the consumer's delivery stream. Pends forever
/// when no consumer is attached; the select guard keeps it from being
/// polled in that case anyway.
async fn next_delivery_slot(
    consumer: &Option<ConsumerSlot>,
) -> Result<mpsc::OwnedPermit<Delivery>, mpsc::error::SendError<()>> {
    match consumer {
        Some(slot) => slot.sender.clone().reserve_owned().await,
        None => std::future::pending().await,
    }
}
