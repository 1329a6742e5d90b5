//! Typed publication.

use serde::Serialize;
use warlink_broker::Channel;
use warlink_codec::Codec;

use crate::PubSubError;

/// Encodes `value` with the codec and hands the resulting envelope to the
/// broker for routing to `exchange` under `routing_key`.
///
/// Encoding happens before any broker interaction: a serialization failure
/// returns immediately and nothing is published. The call resolves once
/// the broker has routed the message; it does not wait for any queue to
/// accept it, let alone a consumer to acknowledge it (fire-and-forget). A
/// confirm-mode variant could await queue deposit behind this same
/// signature; the baseline does not.
///
/// The `&mut Channel` is deliberate: a channel serves one publisher at a
/// time. Tasks that publish concurrently each open their own channel.
///
/// # Errors
/// [`PubSubError::Serialization`] when encoding fails,
/// [`PubSubError::Topology`] when the exchange does not exist,
/// [`PubSubError::Connection`] when the broker is unavailable.
pub async fn publish<C, T>(
    channel: &mut Channel,
    codec: &C,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PubSubError>
where
    C: Codec,
    T: Serialize,
{
    let envelope = codec.encode_envelope(value)?;
    channel.publish(exchange, routing_key, envelope).await?;
    tracing::debug!(%exchange, key = %routing_key, "message published");
    Ok(())
}
