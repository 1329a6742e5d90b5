//! Routing conventions and payload shapes for Warlink games.
//!
//! The messaging core treats all of this as configuration: it never
//! generates keys or inspects payloads itself. This crate is the single
//! place where the game's exchanges, routing-key grammar, and message
//! shapes are pinned down, so every participant speaks the same dialect.
//!
//! Two exchanges carry game traffic:
//!
//! - the **direct** exchange, for the fixed pause/resume control key —
//!   each session consumes it through its own `pause.<player>` queue;
//! - the **topic** exchange, for category-prefixed event keys of the
//!   shape `<category>.<player>` — consumers bind `<category>.*` to see
//!   every player's events in a category.
//!
//! A third, fixed dead-letter exchange receives every discarded or
//! undecodable message; the durable [`DEAD_LETTER_QUEUE`] bound to it is
//! the system's audit trail for them.

mod keys;
mod payloads;

pub use keys::{
    ARMY_MOVES_PREFIX, DEAD_LETTER_QUEUE, EXCHANGE_DEAD_LETTER, EXCHANGE_DIRECT, EXCHANGE_TOPIC,
    GAME_LOGS_PREFIX, PAUSE_KEY, WAR_RECOGNITIONS_PREFIX, all_of, army_moves_key, game_logs_key,
    pause_queue, war_key,
};
pub use payloads::{ArmyMove, GameLog, PlayingState, RecognitionOfWar};
