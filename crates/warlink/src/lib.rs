//! # Warlink
//!
//! Asynchronous pub/sub messaging backbone for distributed games.
//!
//! Warlink connects a game's participants — a server and many clients —
//! through routed messages on an in-process broker: typed publication,
//! topology-managed queues, and background consumer loops that turn every
//! delivery into exactly one acknowledgment outcome chosen by game logic.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use warlink::prelude::*;
//!
//! # async fn run() -> Result<(), warlink::WarlinkError> {
//! let broker = Broker::start(BrokerConfig::default());
//! let conn = broker.connect().await?;
//! warlink::bootstrap::declare_game_topology(&conn).await?;
//!
//! // Watch every player's army moves.
//! let topology = Topology::new(
//!     EXCHANGE_TOPIC,
//!     "army_moves.server",
//!     all_of(ARMY_MOVES_PREFIX),
//!     Durability::Transient,
//!     EXCHANGE_DEAD_LETTER,
//! );
//! let _subscription = subscribe(&conn, JsonCodec, topology, |army_move: ArmyMove| {
//!     println!("{} moves {} units", army_move.player, army_move.unit_count);
//!     AckDecision::Ack
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
mod error;

pub use error::WarlinkError;

pub mod prelude {
    //! The working set, re-exported.

    pub use warlink_broker::{
        Broker, BrokerConfig, Channel, Connection, Consumer, Delivery, ExchangeKind, Queue,
        QueueOptions,
    };
    pub use warlink_codec::{Codec, Envelope, JsonCodec};
    pub use warlink_pubsub::{
        AckDecision, Durability, Subscription, Topology, ensure_queue, publish, subscribe,
    };
    pub use warlink_routing::{
        ARMY_MOVES_PREFIX, ArmyMove, DEAD_LETTER_QUEUE, EXCHANGE_DEAD_LETTER, EXCHANGE_DIRECT,
        EXCHANGE_TOPIC, GAME_LOGS_PREFIX, GameLog, PAUSE_KEY, PlayingState, RecognitionOfWar,
        WAR_RECOGNITIONS_PREFIX, all_of, army_moves_key, game_logs_key, pause_queue, war_key,
    };

    pub use crate::WarlinkError;
    pub use crate::bootstrap::declare_game_topology;
}
