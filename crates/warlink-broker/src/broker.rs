//! The central broker actor: topology owner and message router.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, oneshot};
use warlink_codec::Envelope;

use crate::connection::{Connection, ConnectionId};
use crate::delivery::Delivery;
use crate::error::{BrokerError, ConnectionError, TopologyError};
use crate::exchange::{ExchangeKind, key_matches};
use crate::queue::{Queue, QueueCommand, QueueOptions, QueuedMessage, spawn_queue};

/// Tuning knobs for a broker instance.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Capacity of each consumer's delivery stream. A consumer that stops
    /// draining stalls its own queue's dispatch once this many deliveries
    /// are buffered.
    pub consumer_buffer: usize,

    /// Capacity of the broker's command channel.
    pub command_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            consumer_buffer: 8,
            command_buffer: 64,
        }
    }
}

/// Commands sent to the broker actor through its channel.
pub(crate) enum BrokerCommand {
    Connect {
        reply: oneshot::Sender<ConnectionId>,
    },
    CloseConnection {
        conn: ConnectionId,
        reply: Option<oneshot::Sender<()>>,
    },
    DeclareExchange {
        name: String,
        kind: ExchangeKind,
        reply: oneshot::Sender<Result<(), BrokerError>>,
    },
    DeclareQueue {
        conn: ConnectionId,
        name: String,
        options: QueueOptions,
        reply: oneshot::Sender<Result<Queue, BrokerError>>,
    },
    BindQueue {
        queue: String,
        exchange: String,
        routing_key: String,
        reply: oneshot::Sender<Result<(), BrokerError>>,
    },
    Publish {
        exchange: String,
        routing_key: String,
        envelope: Envelope,
        /// `None` for fire-and-forget republishes (dead-lettering).
        reply: Option<oneshot::Sender<Result<(), BrokerError>>>,
    },
    Consume {
        conn: ConnectionId,
        queue: String,
        tag: String,
        reply: oneshot::Sender<Result<mpsc::Receiver<Delivery>, BrokerError>>,
    },
    CancelConsumer {
        conn: ConnectionId,
        queue: String,
        tag: String,
    },
    DescribeQueue {
        name: String,
        reply: oneshot::Sender<Result<Queue, BrokerError>>,
    },
    Shutdown,
}

/// Handle to a running in-process broker.
///
/// Cheap to clone. The broker actor runs until [`shutdown`](Self::shutdown)
/// is called or every handle (including all [`Connection`]s and
/// [`Channel`](crate::Channel)s derived from it) has been dropped.
#[derive(Clone)]
pub struct Broker {
    tx: mpsc::Sender<BrokerCommand>,
}

impl Broker {
    /// Starts a broker actor and returns a handle to it.
    pub fn start(config: BrokerConfig) -> Self {
        let (tx, receiver) = mpsc::channel(config.command_buffer);
        let actor = BrokerActor {
            config,
            receiver,
            self_tx: tx.downgrade(),
            exchanges: HashMap::new(),
            bindings: HashMap::new(),
            queues: HashMap::new(),
            connections: HashMap::new(),
            next_connection_id: 1,
        };
        tokio::spawn(actor.run());
        Self { tx }
    }

    /// Opens a new connection to the broker.
    pub async fn connect(&self) -> Result<Connection, ConnectionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BrokerCommand::Connect { reply })
            .await
            .map_err(|_| ConnectionError::BrokerClosed)?;
        let id = rx.await.map_err(|_| ConnectionError::BrokerClosed)?;
        Ok(Connection::new(id, self.tx.clone()))
    }

    /// Stops the broker. Every queue is dropped and every live delivery
    /// stream ends.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(BrokerCommand::Shutdown).await;
    }
}

/// A binding from an exchange to a queue under a routing key.
struct Binding {
    queue: String,
    routing_key: String,
}

/// Broker-side record of a declared queue.
struct QueueEntry {
    sender: mpsc::UnboundedSender<QueueCommand>,
    options: QueueOptions,
    owner: ConnectionId,
}

/// Per-connection bookkeeping for teardown on close.
#[derive(Default)]
struct ConnectionState {
    exclusive_queues: Vec<String>,
    consumers: Vec<(String, String)>,
}

struct BrokerActor {
    config: BrokerConfig,
    receiver: mpsc::Receiver<BrokerCommand>,
    /// Weak self-handle given to queue actors for dead-letter republish;
    /// weak so queues never keep the broker alive by themselves.
    self_tx: mpsc::WeakSender<BrokerCommand>,
    exchanges: HashMap<String, ExchangeKind>,
    bindings: HashMap<String, Vec<Binding>>,
    queues: HashMap<String, QueueEntry>,
    connections: HashMap<ConnectionId, ConnectionState>,
    next_connection_id: u64,
}

impl BrokerActor {
    async fn run(mut self) {
        tracing::info!("broker started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                BrokerCommand::Connect { reply } => {
                    let id = ConnectionId(self.next_connection_id);
                    self.next_connection_id += 1;
                    self.connections.insert(id, ConnectionState::default());
                    tracing::info!(conn = %id, "connection opened");
                    let _ = reply.send(id);
                }

                BrokerCommand::CloseConnection { conn, reply } => {
                    self.close_connection(conn);
                    if let Some(reply) = reply {
                        let _ = reply.send(());
                    }
                }

                BrokerCommand::DeclareExchange { name, kind, reply } => {
                    let _ = reply.send(self.declare_exchange(name, kind));
                }

                BrokerCommand::DeclareQueue {
                    conn,
                    name,
                    options,
                    reply,
                } => self.declare_queue(conn, name, options, reply),

                BrokerCommand::BindQueue {
                    queue,
                    exchange,
                    routing_key,
                    reply,
                } => {
                    let _ = reply.send(self.bind_queue(queue, exchange, routing_key));
                }

                BrokerCommand::Publish {
                    exchange,
                    routing_key,
                    envelope,
                    reply,
                } => {
                    let result = self.publish(exchange, routing_key, envelope);
                    match reply {
                        Some(reply) => {
                            let _ = reply.send(result);
                        }
                        None => {
                            if let Err(error) = result {
                                tracing::warn!(error = %error, "fire-and-forget publish failed");
                            }
                        }
                    }
                }

                BrokerCommand::Consume {
                    conn,
                    queue,
                    tag,
                    reply,
                } => self.consume(conn, queue, tag, reply),

                BrokerCommand::CancelConsumer { conn, queue, tag } => {
                    if let Some(state) = self.connections.get_mut(&conn) {
                        state.consumers.retain(|(q, t)| !(*q == queue && *t == tag));
                    }
                    if let Some(entry) = self.queues.get(&queue) {
                        let _ = entry.sender.send(QueueCommand::Cancel { tag });
                    }
                }

                BrokerCommand::DescribeQueue { name, reply } => match self.queues.get(&name) {
                    Some(entry) => {
                        let _ = entry.sender.send(QueueCommand::Describe { reply });
                    }
                    None => {
                        let _ = reply.send(Err(TopologyError::UnknownQueue(name).into()));
                    }
                },

                BrokerCommand::Shutdown => {
                    tracing::info!("broker shutting down");
                    break;
                }
            }
        }

        tracing::info!("broker stopped");
    }

    fn close_connection(&mut self, conn: ConnectionId) {
        let Some(state) = self.connections.remove(&conn) else {
            return;
        };

        for (queue, tag) in state.consumers {
            if let Some(entry) = self.queues.get(&queue) {
                let _ = entry.sender.send(QueueCommand::Cancel { tag });
            }
        }

        for name in state.exclusive_queues {
            if let Some(entry) = self.queues.remove(&name) {
                let _ = entry.sender.send(QueueCommand::Delete);
            }
            for bindings in self.bindings.values_mut() {
                bindings.retain(|binding| binding.queue != name);
            }
            tracing::debug!(queue = %name, conn = %conn, "exclusive queue deleted with its connection");
        }

        tracing::info!(conn = %conn, "connection closed");
    }

    fn declare_exchange(&mut self, name: String, kind: ExchangeKind) -> Result<(), BrokerError> {
        match self.exchanges.get(&name) {
            Some(existing) if *existing == kind => Ok(()),
            Some(existing) => Err(TopologyError::ExchangeConflict {
                name,
                existing: *existing,
            }
            .into()),
            None => {
                tracing::info!(exchange = %name, %kind, "exchange declared");
                self.exchanges.insert(name, kind);
                Ok(())
            }
        }
    }

    fn declare_queue(
        &mut self,
        conn: ConnectionId,
        name: String,
        options: QueueOptions,
        reply: oneshot::Sender<Result<Queue, BrokerError>>,
    ) {
        if !self.connections.contains_key(&conn) {
            let _ = reply.send(Err(ConnectionError::ConnectionClosed.into()));
            return;
        }

        if let Some(entry) = self.queues.get(&name) {
            if entry.options.exclusive && entry.owner != conn {
                let _ = reply.send(Err(TopologyError::Exclusive(name).into()));
            } else if entry.options != options {
                let _ = reply.send(Err(TopologyError::QueueConflict { name }.into()));
            } else {
                // Idempotent re-declaration; the queue reports its counters.
                let _ = entry.sender.send(QueueCommand::Describe { reply });
            }
            return;
        }

        let sender = spawn_queue(name.clone(), options.clone(), self.self_tx.clone());
        if options.exclusive {
            if let Some(state) = self.connections.get_mut(&conn) {
                state.exclusive_queues.push(name.clone());
            }
        }
        let _ = sender.send(QueueCommand::Describe { reply });
        tracing::info!(queue = %name, conn = %conn, durable = options.durable, "queue declared");
        self.queues.insert(
            name,
            QueueEntry {
                sender,
                options,
                owner: conn,
            },
        );
    }

    fn bind_queue(
        &mut self,
        queue: String,
        exchange: String,
        routing_key: String,
    ) -> Result<(), BrokerError> {
        if !self.exchanges.contains_key(&exchange) {
            return Err(TopologyError::UnknownExchange(exchange).into());
        }
        if !self.queues.contains_key(&queue) {
            return Err(TopologyError::UnknownQueue(queue).into());
        }

        let bindings = self.bindings.entry(exchange.clone()).or_default();
        let exists = bindings
            .iter()
            .any(|binding| binding.queue == queue && binding.routing_key == routing_key);
        if !exists {
            tracing::info!(%queue, %exchange, key = %routing_key, "queue bound");
            bindings.push(Binding { queue, routing_key });
        }
        Ok(())
    }

    fn publish(
        &self,
        exchange: String,
        routing_key: String,
        envelope: Envelope,
    ) -> Result<(), BrokerError> {
        let Some(kind) = self.exchanges.get(&exchange) else {
            return Err(TopologyError::UnknownExchange(exchange).into());
        };

        // One copy per queue, no matter how many of its bindings match.
        let mut matched: HashSet<&str> = HashSet::new();
        if let Some(bindings) = self.bindings.get(&exchange) {
            for binding in bindings {
                if key_matches(*kind, &binding.routing_key, &routing_key) {
                    matched.insert(binding.queue.as_str());
                }
            }
        }

        if matched.is_empty() {
            tracing::debug!(%exchange, key = %routing_key, "message matched no binding, dropped");
            return Ok(());
        }

        for queue in matched {
            if let Some(entry) = self.queues.get(queue) {
                let _ = entry.sender.send(QueueCommand::Deposit(QueuedMessage {
                    routing_key: routing_key.clone(),
                    envelope: envelope.clone(),
                    redelivered: false,
                }));
            }
        }
        Ok(())
    }

    fn consume(
        &mut self,
        conn: ConnectionId,
        queue: String,
        tag: String,
        reply: oneshot::Sender<Result<mpsc::Receiver<Delivery>, BrokerError>>,
    ) {
        if !self.connections.contains_key(&conn) {
            let _ = reply.send(Err(ConnectionError::ConnectionClosed.into()));
            return;
        }

        let Some(entry) = self.queues.get(&queue) else {
            let _ = reply.send(Err(TopologyError::UnknownQueue(queue).into()));
            return;
        };
        if entry.options.exclusive && entry.owner != conn {
            let _ = reply.send(Err(TopologyError::Exclusive(queue).into()));
            return;
        }

        let buffer = self.config.consumer_buffer;
        let command = QueueCommand::Consume {
            tag: tag.clone(),
            buffer,
            reply,
        };
        if entry.sender.send(command).is_ok() {
            if let Some(state) = self.connections.get_mut(&conn) {
                state.consumers.push((queue, tag));
            }
        }
    }
}
