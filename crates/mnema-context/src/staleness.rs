// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic-type freshness thresholds.
//!
//! Each topic type has a maximum useful fact age; facts older than the
//! threshold are flagged stale. Staleness is informational for the prompt,
//! it does not itself force a web search.

use chrono::{DateTime, Duration, Utc};

use mnema_core::types::parse_timestamp;

/// Maximum fact age for a topic. Matched by substring against the topic
/// key, first match wins; "ceo" and "resignation" topics age like news.
pub fn max_age(topic: &str) -> Duration {
    let lower = topic.to_lowercase();
    if lower.contains("weather") {
        Duration::hours(1)
    } else if lower.contains("stock") {
        Duration::hours(4)
    } else if lower.contains("news") || lower.contains("ceo") || lower.contains("resignation") {
        Duration::days(1)
    } else if lower.contains("personal") {
        Duration::days(365)
    } else {
        Duration::days(7)
    }
}

/// Whether a fact recorded at `timestamp` is stale for `topic` as of `now`.
///
/// Strictly older than the threshold: a fact aged exactly at the threshold
/// is still fresh. Unparseable timestamps are treated as stale.
pub fn is_stale(topic: &str, timestamp: &str, now: DateTime<Utc>) -> bool {
    match parse_timestamp(timestamp) {
        Some(t) => now - t > max_age(topic),
        None => true,
    }
}

/// A nudge to offer fresh information on a fast-moving topic the user has
/// not asked about in a while. Only stock and news-like topics qualify.
pub fn proactive_update_suggestion(
    topic: &str,
    last_discussed: &str,
    now: DateTime<Utc>,
) -> Option<String> {
    let lower = topic.to_lowercase();
    let fast_moving = lower.contains("stock")
        || lower.contains("news")
        || lower.contains("ceo")
        || lower.contains("resignation");
    if !fast_moving {
        return None;
    }
    let last = parse_timestamp(last_discussed)?;
    if now - last > max_age(topic) {
        Some(format!(
            "It has been a while since we discussed {topic}. Would you like an update?"
        ))
    } else {
        None
    }
}
