//! The acknowledgment outcome vocabulary.

/// What a handler decided about one delivery.
///
/// This is the only channel through which handler-level outcomes affect
/// message lifecycle. The consumer loop maps every variant to a broker
/// acknowledgment call — exhaustively, so a new variant cannot silently
/// fall through to `Ack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// The message was processed; the broker removes it for good.
    Ack,

    /// The message could not be processed right now; the broker delivers
    /// it again. Handlers must therefore be safe to run more than once for
    /// the same logical message — redelivery is expected, not exceptional.
    NackRequeue,

    /// The message is rejected for good; the broker routes it to the
    /// queue's dead-letter exchange instead of deleting it silently.
    NackDiscard,
}
