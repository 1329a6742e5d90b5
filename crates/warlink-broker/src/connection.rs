//! Connection, channel, and consumer handles.
//!
//! A [`Connection`] is the explicitly owned link to the broker: opened via
//! [`Broker::connect`](crate::Broker::connect), passed by reference into
//! the layers that need it, and released with [`close`](Connection::close)
//! (or on drop, as a fallback). Channels are per-task operation handles
//! carved from a connection.

use std::fmt;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use warlink_codec::Envelope;

use crate::broker::BrokerCommand;
use crate::delivery::Delivery;
use crate::error::{BrokerError, ConnectionError};
use crate::exchange::ExchangeKind;
use crate::queue::{Queue, QueueOptions};

/// A unique identifier for a broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// An open connection to the broker.
///
/// Closing the connection (explicitly or by dropping the handle) cancels
/// every consumer registered through it and deletes every queue it
/// declared exclusively — which is how transient, per-session topology
/// disappears with its session.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<BrokerCommand>,
    closed: AtomicBool,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, tx: mpsc::Sender<BrokerCommand>) -> Self {
        Self {
            id,
            tx,
            closed: AtomicBool::new(false),
        }
    }

    /// This connection's identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Opens a channel on this connection.
    ///
    /// Channels are cheap; dedicate one per publishing task rather than
    /// sharing — a channel hands out `&mut` operations precisely so that
    /// concurrent publishers need their own.
    pub fn open_channel(&self) -> Channel {
        Channel {
            conn: self.id,
            tx: self.tx.clone(),
        }
    }

    /// Closes the connection and waits for its teardown to finish.
    /// Idempotent; later calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (reply, rx) = oneshot::channel();
        let command = BrokerCommand::CloseConnection {
            conn: self.id,
            reply: Some(reply),
        };
        if self.tx.send(command).await.is_ok() {
            let _ = rx.await;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Best-effort teardown for connections that were never closed
        // explicitly. `try_send` because Drop cannot await.
        if !self.closed.load(Ordering::SeqCst) {
            let _ = self.tx.try_send(BrokerCommand::CloseConnection {
                conn: self.id,
                reply: None,
            });
        }
    }
}

/// An operation handle scoped to one connection.
///
/// Mutating operations take `&mut self`: a channel serves one caller at a
/// time, and anyone who wants to publish concurrently opens their own
/// channel instead of sharing one behind a lock.
#[derive(Debug)]
pub struct Channel {
    conn: ConnectionId,
    tx: mpsc::Sender<BrokerCommand>,
}

impl Channel {
    /// Declares an exchange. Idempotent for an identical kind; a kind
    /// change is a [`TopologyError`](crate::TopologyError).
    pub async fn exchange_declare(
        &mut self,
        name: &str,
        kind: ExchangeKind,
    ) -> Result<(), BrokerError> {
        let (reply, rx) = oneshot::channel();
        let command = BrokerCommand::DeclareExchange {
            name: name.to_string(),
            kind,
            reply,
        };
        self.request(command, rx).await?
    }

    /// Declares a queue. Idempotent for identical options; conflicting
    /// options or another connection's exclusive queue fail loudly.
    pub async fn queue_declare(
        &mut self,
        name: &str,
        options: QueueOptions,
    ) -> Result<Queue, BrokerError> {
        let (reply, rx) = oneshot::channel();
        let command = BrokerCommand::DeclareQueue {
            conn: self.conn,
            name: name.to_string(),
            options,
            reply,
        };
        self.request(command, rx).await?
    }

    /// Binds a queue to an exchange under a routing key.
    pub async fn queue_bind(
        &mut self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        let (reply, rx) = oneshot::channel();
        let command = BrokerCommand::BindQueue {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            reply,
        };
        self.request(command, rx).await?
    }

    /// Publishes an envelope to an exchange under a routing key.
    ///
    /// Resolves once the broker has routed the message; queue deposit and
    /// delivery are not awaited (fire-and-forget).
    pub async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        envelope: Envelope,
    ) -> Result<(), BrokerError> {
        let (reply, rx) = oneshot::channel();
        let command = BrokerCommand::Publish {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            envelope,
            reply: Some(reply),
        };
        self.request(command, rx).await?
    }

    /// Attaches a consumer to a queue and returns its delivery stream.
    pub async fn consume(&mut self, queue: &str) -> Result<Consumer, BrokerError> {
        let tag = generate_consumer_tag();
        let (reply, rx) = oneshot::channel();
        let command = BrokerCommand::Consume {
            conn: self.conn,
            queue: queue.to_string(),
            tag: tag.clone(),
            reply,
        };
        let receiver = self.request(command, rx).await??;
        Ok(Consumer {
            tag,
            queue: queue.to_string(),
            receiver,
        })
    }

    /// Detaches the consumer with the given tag from a queue. Deliveries
    /// already buffered on its stream remain consumable.
    pub async fn cancel_consumer(&mut self, queue: &str, tag: &str) -> Result<(), BrokerError> {
        let command = BrokerCommand::CancelConsumer {
            conn: self.conn,
            queue: queue.to_string(),
            tag: tag.to_string(),
        };
        self.tx
            .send(command)
            .await
            .map_err(|_| ConnectionError::BrokerClosed)?;
        Ok(())
    }

    /// Looks up a queue's descriptor and counters without declaring it.
    pub async fn queue_info(&self, name: &str) -> Result<Queue, BrokerError> {
        let (reply, rx) = oneshot::channel();
        let command = BrokerCommand::DescribeQueue {
            name: name.to_string(),
            reply,
        };
        self.request(command, rx).await?
    }

    async fn request<T>(
        &self,
        command: BrokerCommand,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, ConnectionError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ConnectionError::BrokerClosed)?;
        rx.await.map_err(|_| ConnectionError::BrokerClosed)
    }
}

/// An attached consumer: a tag and the receiving half of the queue's
/// bounded delivery stream.
///
/// The stream ends (`recv` returns `None`) when the consumer is
/// cancelled, its queue is deleted, or the broker shuts down.
#[derive(Debug)]
pub struct Consumer {
    tag: String,
    queue: String,
    receiver: mpsc::Receiver<Delivery>,
}

impl Consumer {
    /// The broker-assigned consumer tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The queue this consumer is attached to.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Waits for the next delivery.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// Generates a random consumer tag (8 random bytes, hex-encoded).
fn generate_consumer_tag() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    let mut tag = String::from("ctag-");
    for byte in bytes {
        let _ = write!(tag, "{byte:02x}");
    }
    tag
}
