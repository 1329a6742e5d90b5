//! In-process message-exchange broker for Warlink.
//!
//! This crate implements the broker the rest of the stack publishes to and
//! consumes from: exchanges of two kinds (*direct* — exact routing-key
//! match — and *topic* — wildcard segment match), named queues with
//! durability options, bindings, and per-delivery acknowledgment with an
//! explicit requeue flag.
//!
//! # Architecture
//!
//! The broker is a set of Tokio actors. One central actor owns the
//! topology (exchanges, bindings, queue registry, connections); each queue
//! runs in its own task owning its ready backlog, its unacked map, and at
//! most one consumer. Handles ([`Broker`], [`Connection`], [`Channel`])
//! are thin command-channel wrappers, so every operation is a message to
//! an actor and no state is shared between tasks.
//!
//! ```text
//! Channel ──commands──▶ broker actor ──deposits──▶ queue actors
//!                                                      │
//! Consumer ◀────────bounded delivery stream────────────┘
//! ```
//!
//! Deliveries reach a consumer through a bounded channel, so a slow
//! consumer applies backpressure to its own queue and nothing else.

mod broker;
mod connection;
mod delivery;
mod error;
mod exchange;
mod queue;

pub use broker::{Broker, BrokerConfig};
pub use connection::{Channel, Connection, ConnectionId, Consumer};
pub use delivery::Delivery;
pub use error::{BrokerError, ConnectionError, TopologyError};
pub use exchange::ExchangeKind;
pub use queue::{Queue, QueueOptions};
