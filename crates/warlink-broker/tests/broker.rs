//! Integration tests for the in-process broker: topology declaration,
//! routing, delivery, and acknowledgment semantics.

use std::time::Duration;

use warlink_broker::{
    Broker, BrokerConfig, BrokerError, ConnectionError, Consumer, Delivery, ExchangeKind,
    QueueOptions, TopologyError,
};
use warlink_codec::Envelope;

fn envelope(body: &str) -> Envelope {
    Envelope::new("text/plain", body.as_bytes().to_vec())
}

fn body_of(delivery: &Delivery) -> &str {
    std::str::from_utf8(&delivery.envelope.body).unwrap()
}

/// Waits briefly for a delivery that is expected to arrive.
async fn expect_delivery(consumer: &mut Consumer) -> Delivery {
    tokio::time::timeout(Duration::from_secs(2), consumer.recv())
        .await
        .expect("timed out waiting for a delivery")
        .expect("delivery stream ended unexpectedly")
}

/// Asserts that no delivery arrives within a short window.
async fn expect_silence(consumer: &mut Consumer) {
    let result = tokio::time::timeout(Duration::from_millis(150), consumer.recv()).await;
    assert!(result.is_err(), "received a delivery that should not exist");
}

// =========================================================================
// Topology declaration
// =========================================================================

#[tokio::test]
async fn redeclaring_a_queue_with_identical_options_is_idempotent() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    let options = QueueOptions {
        durable: true,
        ..QueueOptions::default()
    };
    let first = channel.queue_declare("logs", options.clone()).await.unwrap();
    let second = channel.queue_declare("logs", options).await.unwrap();

    assert_eq!(first.name, "logs");
    assert_eq!(second.name, "logs");
}

#[tokio::test]
async fn redeclaring_a_queue_with_a_different_durability_fails() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    let durable = QueueOptions {
        durable: true,
        ..QueueOptions::default()
    };
    channel.queue_declare("logs", durable).await.unwrap();

    let transient = QueueOptions {
        exclusive: true,
        auto_delete: true,
        ..QueueOptions::default()
    };
    let err = channel.queue_declare("logs", transient).await.unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topology(TopologyError::QueueConflict { .. })
    ));
}

#[tokio::test]
async fn redeclaring_an_exchange_with_a_different_kind_fails() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("events", ExchangeKind::Topic)
        .await
        .unwrap();
    channel
        .exchange_declare("events", ExchangeKind::Topic)
        .await
        .unwrap();

    let err = channel
        .exchange_declare("events", ExchangeKind::Direct)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topology(TopologyError::ExchangeConflict { .. })
    ));
}

#[tokio::test]
async fn binding_requires_both_exchange_and_queue_to_exist() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    let err = channel.queue_bind("nowhere", "nothing", "key").await.unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topology(TopologyError::UnknownExchange(_))
    ));

    channel
        .exchange_declare("events", ExchangeKind::Direct)
        .await
        .unwrap();
    let err = channel.queue_bind("nowhere", "events", "key").await.unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topology(TopologyError::UnknownQueue(_))
    ));
}

// =========================================================================
// Exclusivity and connection teardown
// =========================================================================

#[tokio::test]
async fn exclusive_queues_reject_other_connections() {
    let broker = Broker::start(BrokerConfig::default());
    let owner = broker.connect().await.unwrap();
    let stranger = broker.connect().await.unwrap();

    let options = QueueOptions {
        exclusive: true,
        auto_delete: true,
        ..QueueOptions::default()
    };
    let mut owner_channel = owner.open_channel();
    owner_channel
        .queue_declare("pause.alice", options.clone())
        .await
        .unwrap();

    // Identical options, different connection: still locked out.
    let mut stranger_channel = stranger.open_channel();
    let err = stranger_channel
        .queue_declare("pause.alice", options)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topology(TopologyError::Exclusive(_))
    ));

    let err = stranger_channel.consume("pause.alice").await.unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topology(TopologyError::Exclusive(_))
    ));
}

#[tokio::test]
async fn exclusive_queues_are_deleted_when_their_connection_closes() {
    let broker = Broker::start(BrokerConfig::default());
    let owner = broker.connect().await.unwrap();
    let observer = broker.connect().await.unwrap();

    let options = QueueOptions {
        exclusive: true,
        auto_delete: true,
        ..QueueOptions::default()
    };
    let mut owner_channel = owner.open_channel();
    owner_channel
        .queue_declare("pause.alice", options)
        .await
        .unwrap();

    let observer_channel = observer.open_channel();
    assert!(observer_channel.queue_info("pause.alice").await.is_ok());

    owner.close().await;

    let err = observer_channel.queue_info("pause.alice").await.unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topology(TopologyError::UnknownQueue(_))
    ));
}

#[tokio::test]
async fn durable_queues_survive_their_declaring_connection() {
    let broker = Broker::start(BrokerConfig::default());
    let declarer = broker.connect().await.unwrap();
    let observer = broker.connect().await.unwrap();

    let options = QueueOptions {
        durable: true,
        ..QueueOptions::default()
    };
    let mut channel = declarer.open_channel();
    channel.queue_declare("game_logs", options.clone()).await.unwrap();
    declarer.close().await;

    // Still there, and another connection can re-declare it idempotently.
    let mut observer_channel = observer.open_channel();
    assert!(observer_channel.queue_info("game_logs").await.is_ok());
    assert!(observer_channel.queue_declare("game_logs", options).await.is_ok());
}

#[tokio::test]
async fn operations_on_a_closed_connection_fail() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();
    conn.close().await;

    let err = channel
        .queue_declare("late", QueueOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Connection(ConnectionError::ConnectionClosed)
    ));
}

// =========================================================================
// Routing
// =========================================================================

#[tokio::test]
async fn direct_exchanges_route_on_exact_key_only() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("control", ExchangeKind::Direct)
        .await
        .unwrap();
    channel
        .queue_declare("pause.alice", QueueOptions::default())
        .await
        .unwrap();
    channel
        .queue_bind("pause.alice", "control", "pause")
        .await
        .unwrap();

    let mut consumer = channel.consume("pause.alice").await.unwrap();

    channel.publish("control", "pause", envelope("on")).await.unwrap();
    channel
        .publish("control", "pause.alice", envelope("miss"))
        .await
        .unwrap();

    let delivery = expect_delivery(&mut consumer).await;
    assert_eq!(body_of(&delivery), "on");
    assert_eq!(delivery.routing_key, "pause");
    delivery.ack().unwrap();

    expect_silence(&mut consumer).await;
}

#[tokio::test]
async fn topic_exchanges_route_on_wildcard_segments() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("events", ExchangeKind::Topic)
        .await
        .unwrap();
    channel
        .queue_declare("moves", QueueOptions::default())
        .await
        .unwrap();
    channel
        .queue_bind("moves", "events", "army_moves.*")
        .await
        .unwrap();

    let mut consumer = channel.consume("moves").await.unwrap();

    channel
        .publish("events", "army_moves.alice", envelope("north"))
        .await
        .unwrap();
    channel
        .publish("events", "war.alice", envelope("miss"))
        .await
        .unwrap();

    let delivery = expect_delivery(&mut consumer).await;
    assert_eq!(delivery.routing_key, "army_moves.alice");
    delivery.ack().unwrap();

    expect_silence(&mut consumer).await;
}

#[tokio::test]
async fn publishing_to_an_unknown_exchange_fails() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    let err = channel
        .publish("nothing", "key", envelope("lost"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topology(TopologyError::UnknownExchange(_))
    ));
}

#[tokio::test]
async fn unroutable_messages_are_dropped_not_errors() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("events", ExchangeKind::Topic)
        .await
        .unwrap();
    // No binding matches this key; the publish still succeeds.
    channel
        .publish("events", "army_moves.alice", envelope("void"))
        .await
        .unwrap();
}

#[tokio::test]
async fn each_matching_queue_gets_its_own_copy() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("events", ExchangeKind::Topic)
        .await
        .unwrap();
    for queue in ["watcher.one", "watcher.two"] {
        channel.queue_declare(queue, QueueOptions::default()).await.unwrap();
        channel.queue_bind(queue, "events", "army_moves.*").await.unwrap();
    }

    let mut one = channel.consume("watcher.one").await.unwrap();
    let mut two = channel.consume("watcher.two").await.unwrap();

    channel
        .publish("events", "army_moves.alice", envelope("north"))
        .await
        .unwrap();

    expect_delivery(&mut one).await.ack().unwrap();
    expect_delivery(&mut two).await.ack().unwrap();
}

// =========================================================================
// Delivery and acknowledgment
// =========================================================================

#[tokio::test]
async fn deliveries_preserve_publish_order() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("events", ExchangeKind::Direct)
        .await
        .unwrap();
    channel
        .queue_declare("ordered", QueueOptions::default())
        .await
        .unwrap();
    channel.queue_bind("ordered", "events", "step").await.unwrap();

    for body in ["one", "two", "three"] {
        channel.publish("events", "step", envelope(body)).await.unwrap();
    }

    let mut consumer = channel.consume("ordered").await.unwrap();
    for expected in ["one", "two", "three"] {
        let delivery = expect_delivery(&mut consumer).await;
        assert_eq!(body_of(&delivery), expected);
        delivery.ack().unwrap();
    }
}

#[tokio::test]
async fn acked_deliveries_drain_the_queue() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("events", ExchangeKind::Direct)
        .await
        .unwrap();
    channel
        .queue_declare("work", QueueOptions::default())
        .await
        .unwrap();
    channel.queue_bind("work", "events", "job").await.unwrap();

    channel.publish("events", "job", envelope("payload")).await.unwrap();

    let mut consumer = channel.consume("work").await.unwrap();
    expect_delivery(&mut consumer).await.ack().unwrap();

    let info = channel.queue_info("work").await.unwrap();
    assert_eq!(info.messages_ready, 0);
    assert_eq!(info.messages_unacked, 0);
    assert_eq!(info.consumers, 1);
}

#[tokio::test]
async fn nack_with_requeue_redelivers_the_same_message() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("events", ExchangeKind::Topic)
        .await
        .unwrap();
    channel
        .queue_declare("moves", QueueOptions::default())
        .await
        .unwrap();
    channel.queue_bind("moves", "events", "army_moves.*").await.unwrap();

    channel
        .publish("events", "army_moves.alice", envelope("north"))
        .await
        .unwrap();

    let mut consumer = channel.consume("moves").await.unwrap();

    let first = expect_delivery(&mut consumer).await;
    assert!(!first.redelivered);
    first.nack(true).unwrap();

    let second = expect_delivery(&mut consumer).await;
    assert!(second.redelivered);
    assert_eq!(body_of(&second), "north");
    second.ack().unwrap();

    expect_silence(&mut consumer).await;
}

#[tokio::test]
async fn nack_without_requeue_routes_to_the_dead_letter_exchange() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("events", ExchangeKind::Topic)
        .await
        .unwrap();
    channel.exchange_declare("dlx", ExchangeKind::Topic).await.unwrap();
    channel
        .queue_declare(
            "audit",
            QueueOptions {
                durable: true,
                ..QueueOptions::default()
            },
        )
        .await
        .unwrap();
    channel.queue_bind("audit", "dlx", "#").await.unwrap();

    channel
        .queue_declare(
            "moves",
            QueueOptions {
                dead_letter_exchange: Some("dlx".into()),
                ..QueueOptions::default()
            },
        )
        .await
        .unwrap();
    channel.queue_bind("moves", "events", "army_moves.*").await.unwrap();

    channel
        .publish("events", "army_moves.alice", envelope("refused"))
        .await
        .unwrap();

    let mut consumer = channel.consume("moves").await.unwrap();
    expect_delivery(&mut consumer).await.nack(false).unwrap();

    // The discarded message shows up on the audit queue, original key intact.
    let mut audit = channel.consume("audit").await.unwrap();
    let dead = expect_delivery(&mut audit).await;
    assert_eq!(dead.routing_key, "army_moves.alice");
    assert_eq!(body_of(&dead), "refused");
    dead.ack().unwrap();
}

#[tokio::test]
async fn a_second_consumer_on_the_same_queue_is_rejected() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .queue_declare("solo", QueueOptions::default())
        .await
        .unwrap();

    let _first = channel.consume("solo").await.unwrap();
    let err = channel.consume("solo").await.unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topology(TopologyError::ConsumerBusy(_))
    ));
}

#[tokio::test]
async fn cancelling_a_consumer_ends_its_stream() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .queue_declare("quiet", QueueOptions::default())
        .await
        .unwrap();

    let mut consumer = channel.consume("quiet").await.unwrap();
    let tag = consumer.tag().to_string();
    channel.cancel_consumer("quiet", &tag).await.unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(2), consumer.recv()).await;
    assert_eq!(ended.ok().flatten().map(|d| d.delivery_tag()), None);
}

#[tokio::test]
async fn a_dropped_consumer_stream_requeues_its_unacked_deliveries() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .exchange_declare("events", ExchangeKind::Direct)
        .await
        .unwrap();
    channel
        .queue_declare("fragile", QueueOptions::default())
        .await
        .unwrap();
    channel.queue_bind("fragile", "events", "job").await.unwrap();

    channel.publish("events", "job", envelope("first")).await.unwrap();
    channel.publish("events", "job", envelope("second")).await.unwrap();

    // First consumer takes a delivery and dies without resolving it.
    let mut doomed = channel.consume("fragile").await.unwrap();
    let taken = expect_delivery(&mut doomed).await;
    assert_eq!(body_of(&taken), "first");
    let tag = doomed.tag().to_string();
    drop(taken);
    drop(doomed);
    channel.cancel_consumer("fragile", &tag).await.unwrap();

    // A replacement consumer sees everything again, in order, redelivered
    // where it had been handed out before.
    let mut replacement = channel.consume("fragile").await.unwrap();
    let first = expect_delivery(&mut replacement).await;
    assert_eq!(body_of(&first), "first");
    assert!(first.redelivered);
    first.ack().unwrap();

    let second = expect_delivery(&mut replacement).await;
    assert_eq!(body_of(&second), "second");
    second.ack().unwrap();
}

// =========================================================================
// Broker lifecycle
// =========================================================================

#[tokio::test]
async fn shutdown_ends_live_delivery_streams() {
    let broker = Broker::start(BrokerConfig::default());
    let conn = broker.connect().await.unwrap();
    let mut channel = conn.open_channel();

    channel
        .queue_declare("doomed", QueueOptions::default())
        .await
        .unwrap();
    let mut consumer = channel.consume("doomed").await.unwrap();

    broker.shutdown().await;

    let ended = tokio::time::timeout(Duration::from_secs(2), consumer.recv()).await;
    assert!(matches!(ended, Ok(None)));

    let err = broker.connect().await.unwrap_err();
    assert!(matches!(err, ConnectionError::BrokerClosed));
}
