//! Typed payload shapes exchanged between game participants.
//!
//! These are the wire contracts of the game-logic collaborator. The
//! messaging core carries them as opaque typed values; what a move or a
//! war *means* is decided entirely on the consuming side.

use serde::{Deserialize, Serialize};

/// Whether the game is currently paused. Published by the server on the
/// direct exchange under [`PAUSE_KEY`](crate::PAUSE_KEY); every session
/// consumes it through its own pause queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayingState {
    /// `true` pauses every client, `false` resumes them.
    pub is_paused: bool,
}

/// An army movement order, published under
/// `army_moves.<player>` on the topic exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmyMove {
    /// The player issuing the order.
    pub player: String,
    /// How many units are moving.
    pub unit_count: u32,
    /// Where they are headed.
    pub destination: String,
}

/// A declaration that two players' armies have met, published under
/// `war.<player>` on the topic exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOfWar {
    /// The player whose move triggered the encounter.
    pub attacker: String,
    /// The player being moved against.
    pub defender: String,
}

/// One aggregated game log line, published under `game_logs.<player>` and
/// collected on a durable queue so log lines survive the collector being
/// away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLog {
    /// Milliseconds since the Unix epoch at the time of the event.
    pub recorded_at_ms: u64,
    /// The player the line is about.
    pub player: String,
    /// The human-readable line.
    pub message: String,
}
