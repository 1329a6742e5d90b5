//! Game topology bootstrap.

use warlink_broker::{Connection, ExchangeKind, QueueOptions};
use warlink_routing as routing;

use crate::WarlinkError;

/// Declares the fixed game topology: the direct control exchange, the
/// topic event exchange, the dead-letter exchange, and the durable audit
/// queue bound to it with `#`.
///
/// Every participant calls this once at startup; all declarations are
/// idempotent, so the order in which participants come up does not
/// matter.
///
/// # Errors
/// Surfaces any declaration conflict with previously declared topology.
pub async fn declare_game_topology(conn: &Connection) -> Result<(), WarlinkError> {
    let mut channel = conn.open_channel();

    channel
        .exchange_declare(routing::EXCHANGE_DIRECT, ExchangeKind::Direct)
        .await?;
    channel
        .exchange_declare(routing::EXCHANGE_TOPIC, ExchangeKind::Topic)
        .await?;
    channel
        .exchange_declare(routing::EXCHANGE_DEAD_LETTER, ExchangeKind::Topic)
        .await?;

    // The audit queue itself has no dead-letter target: a message dropped
    // from here has nowhere further to go.
    let options = QueueOptions {
        durable: true,
        ..QueueOptions::default()
    };
    channel
        .queue_declare(routing::DEAD_LETTER_QUEUE, options)
        .await?;
    channel
        .queue_bind(routing::DEAD_LETTER_QUEUE, routing::EXCHANGE_DEAD_LETTER, "#")
        .await?;

    tracing::info!("game topology declared");
    Ok(())
}
