//! MQTT topic filter helpers

/// Single-level wildcard
pub const SINGLE_LEVEL_WILDCARD: char = '+';

/// Multi-level wildcard
pub const MULTI_LEVEL_WILDCARD: char = '#';

/// Whether a topic filter contains a wildcard marker
pub fn has_wildcard(filter: &str) -> bool {
    filter.contains(SINGLE_LEVEL_WILDCARD) || filter.contains(MULTI_LEVEL_WILDCARD)
}

/// Whether `topic` matches the subscription `filter`
///
/// `+` matches exactly one level, `#` matches the rest of the topic
/// (including the parent level, so `a/#` matches `a`).
pub fn matches(filter: &str, topic: &str) -> bool {
    if !has_wildcard(filter) {
        return filter == topic;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
