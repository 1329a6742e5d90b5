//! Subscriptions and the per-delivery consumer loop.

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use warlink_broker::{Channel, Connection, Consumer};
use warlink_codec::Codec;

use crate::{AckDecision, PubSubError, Topology, ensure_queue};

/// A running subscription.
///
/// The consumer loop runs in its own background task until the owning
/// connection closes, the broker shuts down, or [`cancel`](Self::cancel)
/// is called. Dropping this handle detaches the task without stopping it.
#[derive(Debug)]
pub struct Subscription {
    queue: String,
    consumer_tag: String,
    channel: Channel,
    task: JoinHandle<()>,
}

impl Subscription {
    /// The queue this subscription consumes from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// The broker-assigned consumer tag.
    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Stops this subscription without touching the rest of the
    /// connection: detaches the consumer, then waits for the loop to drain
    /// the deliveries already buffered on its stream and exit. Every
    /// drained delivery is still resolved through the handler.
    pub async fn cancel(self) -> Result<(), PubSubError> {
        let Self {
            queue,
            consumer_tag,
            mut channel,
            task,
        } = self;
        channel.cancel_consumer(&queue, &consumer_tag).await?;
        let _ = task.await;
        tracing::debug!(%queue, "subscription cancelled");
        Ok(())
    }
}

/// Materializes `topology` and starts consuming from its queue in a
/// dedicated background task.
///
/// For every delivery, the task decodes the payload, invokes `handler`,
/// and issues exactly one broker acknowledgment chosen by the returned
/// [`AckDecision`]. A payload that fails to decode is negatively
/// acknowledged without requeue — routed to the topology's dead-letter
/// exchange — and the loop keeps consuming; a bad message never takes the
/// subscription down.
///
/// Deliveries are processed in the order the broker hands them out. A slow
/// handler blocks only its own subscription's stream.
///
/// # Errors
/// Setup-time failures (topology declaration, consumer attachment)
/// propagate synchronously; nothing runs in the background unless setup
/// succeeded.
pub async fn subscribe<C, T, F>(
    conn: &Connection,
    codec: C,
    topology: Topology,
    handler: F,
) -> Result<Subscription, PubSubError>
where
    C: Codec,
    T: DeserializeOwned + Send + 'static,
    F: FnMut(T) -> AckDecision + Send + 'static,
{
    let (mut channel, _queue) = ensure_queue(conn, &topology).await?;
    let consumer = channel.consume(&topology.queue_name).await?;
    let consumer_tag = consumer.tag().to_string();

    tracing::info!(
        queue = %topology.queue_name,
        exchange = %topology.exchange,
        key = %topology.routing_key,
        "subscription started"
    );
    let task = tokio::spawn(run_consumer(consumer, codec, handler));

    Ok(Subscription {
        queue: topology.queue_name,
        consumer_tag,
        channel,
        task,
    })
}

/// The per-delivery state machine:
/// `Received → {Decoded, DecodeFailed} → Handled → {Acknowledged, Rejected}`.
async fn run_consumer<C, T, F>(mut consumer: Consumer, codec: C, mut handler: F)
where
    C: Codec,
    T: DeserializeOwned + Send + 'static,
    F: FnMut(T) -> AckDecision + Send + 'static,
{
    let queue = consumer.queue().to_string();

    while let Some(delivery) = consumer.recv().await {
        let delivery_tag = delivery.delivery_tag();

        let value: T = match codec.decode_envelope(&delivery.envelope) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    %queue,
                    delivery_tag,
                    error = %error,
                    "undecodable delivery dead-lettered"
                );
                if let Err(error) = delivery.nack(false) {
                    tracing::warn!(%queue, delivery_tag, error = %error, "failed to resolve delivery");
                }
                continue;
            }
        };

        let decision = handler(value);
        let resolved = match decision {
            AckDecision::Ack => delivery.ack(),
            AckDecision::NackRequeue => delivery.nack(true),
            AckDecision::NackDiscard => delivery.nack(false),
        };
        match resolved {
            Ok(()) => {
                tracing::debug!(%queue, delivery_tag, ?decision, "delivery resolved");
            }
            Err(error) => {
                tracing::warn!(%queue, delivery_tag, error = %error, "failed to resolve delivery");
            }
        }
    }

    tracing::debug!(%queue, "delivery stream ended, consumer task exiting");
}
