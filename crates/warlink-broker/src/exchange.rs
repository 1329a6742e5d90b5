//! Exchange kinds and routing-key matching.

use std::fmt;

/// The routing discipline of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Exact routing-key match: a binding receives a message only when the
    /// publish key equals the binding key.
    Direct,

    /// Wildcard segment match on dot-delimited keys: `*` matches exactly
    /// one segment, `#` matches zero or more.
    Topic,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Topic => write!(f, "topic"),
        }
    }
}

/// Returns whether a binding with `pattern` receives a message published
/// under `key` on an exchange of the given kind.
pub(crate) fn key_matches(kind: ExchangeKind, pattern: &str, key: &str) -> bool {
    match kind {
        ExchangeKind::Direct => pattern == key,
        ExchangeKind::Topic => topic_matches(pattern, key),
    }
}

fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    segments_match(&pattern, &key)
}

/// Segment-wise wildcard match. `#` is the only segment that can absorb a
/// variable number of key segments, so it recurses over every possible
/// split; the rest is a straight walk.
fn segments_match(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| segments_match(rest, &key[skip..])),
        Some((segment, rest)) => match key.split_first() {
            Some((first, key_rest)) => {
                (*segment == "*" || segment == first) && segments_match(rest, key_rest)
            }
            None => false,
        },
    }
}

// =========================================================================
// Tests
// =========================================================================
