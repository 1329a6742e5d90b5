//! Typed publish/subscribe over the Warlink broker.
//!
//! This crate is the layer game participants actually program against:
//!
//! - [`ensure_queue`] — materializes a [`Topology`] (queue, binding,
//!   dead-letter target) on the broker, idempotently.
//! - [`publish`] — encodes a typed value and hands it to the broker for
//!   routing. Fire-and-forget.
//! - [`subscribe`] — ensures the topology, then runs a background task
//!   that turns every delivery into exactly one acknowledgment outcome
//!   chosen by the caller's handler.
//! - [`AckDecision`] — the closed outcome vocabulary handlers answer with.
//!
//! Handlers never abort a subscription: a handler's only channel of
//! influence over message lifecycle is the [`AckDecision`] it returns, and
//! a payload that fails to decode is dead-lettered while the loop keeps
//! consuming.

mod ack;
mod consume;
mod error;
mod publish;
mod topology;

pub use ack::AckDecision;
pub use consume::{Subscription, subscribe};
pub use error::PubSubError;
pub use publish::publish;
pub use topology::{Durability, Topology, ensure_queue};
