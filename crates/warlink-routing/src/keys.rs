//! Exchange names and routing-key builders.

/// Direct exchange carrying the pause/resume control stream.
pub const EXCHANGE_DIRECT: &str = "warlink_direct";

/// Topic exchange carrying category-prefixed game events.
pub const EXCHANGE_TOPIC: &str = "warlink_topic";

/// Fixed dead-letter exchange every game queue points at.
pub const EXCHANGE_DEAD_LETTER: &str = "warlink_dlx";

/// Durable audit queue bound to the dead-letter exchange with `#`.
pub const DEAD_LETTER_QUEUE: &str = "warlink_dlq";

/// Routing key for pause/resume state on the direct exchange.
pub const PAUSE_KEY: &str = "pause";

/// Topic category for army movement orders.
pub const ARMY_MOVES_PREFIX: &str = "army_moves";

/// Topic category for war recognition events.
pub const WAR_RECOGNITIONS_PREFIX: &str = "war";

/// Topic category for aggregated game log lines.
pub const GAME_LOGS_PREFIX: &str = "game_logs";

/// Name of a player's pause/resume queue: `pause.<player>`.
pub fn pause_queue(player: &str) -> String {
    format!("{PAUSE_KEY}.{player}")
}

/// Routing key for a player's army moves: `army_moves.<player>`.
pub fn army_moves_key(player: &str) -> String {
    format!("{ARMY_MOVES_PREFIX}.{player}")
}

/// Routing key for a player's war recognitions: `war.<player>`.
pub fn war_key(player: &str) -> String {
    format!("{WAR_RECOGNITIONS_PREFIX}.{player}")
}

/// Routing key for a player's game log lines: `game_logs.<player>`.
pub fn game_logs_key(player: &str) -> String {
    format!("{GAME_LOGS_PREFIX}.{player}")
}

/// Binding key matching every player's events in a category:
/// `<prefix>.*`.
pub fn all_of(prefix: &str) -> String {
    format!("{prefix}.*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_the_category_dot_player_shape() {
        assert_eq!(pause_queue("alice"), "pause.alice");
        assert_eq!(army_moves_key("alice"), "army_moves.alice");
        assert_eq!(war_key("bob"), "war.bob");
        assert_eq!(game_logs_key("carol"), "game_logs.carol");
    }

    #[test]
    fn all_of_builds_a_single_segment_wildcard() {
        assert_eq!(all_of(ARMY_MOVES_PREFIX), "army_moves.*");
        assert_eq!(all_of(GAME_LOGS_PREFIX), "game_logs.*");
    }
}
