/// Check if an MQTT topic matches a subscription pattern.
///
/// Supports MQTT-style wildcards: `+` matches exactly one topic level,
/// `#` matches zero or more levels and must be the last level.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic || pattern == "#" {
        return true;
    }

    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some(p), Some(t)) => {
                if p != "+" && p != t {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}
