// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic resolution: maps a free-text query to a stable topic key.
//!
//! Resolution is intentionally coarse. Two different queries can collide on
//! the 50-character fallback key; downstream fact exclusion depends on that
//! stability across near-duplicate phrasings, so the fallback stays verbatim.

use mnema_memory::truncate_chars;

/// Fallback topic key length.
const FALLBACK_TOPIC_LEN: usize = 50;

/// Literal substrings that mark a query as asking about a personal-fact
/// category. First matching category wins.
const PERSONAL_PATTERNS: &[(&str, &[&str])] = &[
    ("name", &["what is my name", "who am i", "my name"]),
    (
        "color",
        &[
            "what is my favorite color",
            "my favorite color",
            "my fav color",
            "which color do i like",
            "what color do i like",
            "what is my fav color",
        ],
    ),
    (
        "work",
        &["where do i work", "what company", "my company", "who do i work for"],
    ),
    ("location", &["where do i live", "where am i from", "my location"]),
    ("preference", &["what do i like", "my favorite", "my preference"]),
];

/// The personal-fact category a query asks about, if any.
pub fn personal_fact_category(query: &str) -> Option<&'static str> {
    let lower = query.to_lowercase();
    for (category, patterns) in PERSONAL_PATTERNS {
        if patterns.iter().any(|p| lower.contains(p)) {
            return Some(category);
        }
    }
    None
}

/// Whether a query asks about the user's own previously stated attributes.
///
/// Matches a category pattern, or the generic heuristic: a first-person
/// pronoun plus a possessive-topic word plus a question mark.
pub fn is_personal_query(query: &str) -> bool {
    if personal_fact_category(query).is_some() {
        return true;
    }
    let lower = query.to_lowercase();
    let has_pronoun = lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .any(|w| matches!(w, "my" | "i" | "me"));
    let has_topic_word = ["favorite", "name", "work", "live", "like"]
        .iter()
        .any(|w| lower.contains(w));
    has_pronoun && has_topic_word && lower.contains('?')
}

/// Resolve a query to its topic key. Pure and total: always returns a
/// non-empty string.
pub fn resolve(query: &str) -> String {
    if let Some(category) = personal_fact_category(query) {
        return format!("personal_{category}");
    }

    let lower = query.to_lowercase();

    if lower.contains("ceo") && lower.contains("resignation") {
        return "CEO resignation".to_string();
    }

    if lower.contains("weather") {
        return format!("weather_{}", weather_location(&lower));
    }

    if lower.contains("stock") {
        return "stock_price".to_string();
    }

    let trimmed = query.trim();
    if trimmed.is_empty() {
        return "general".to_string();
    }
    truncate_chars(trimmed, FALLBACK_TOPIC_LEN).to_string()
}

/// First token following "in", stripped of punctuation, else "unknown".
fn weather_location(lower: &str) -> String {
    let mut words = lower.split_whitespace();
    while let Some(word) = words.next() {
        if word == "in" {
            if let Some(location) = words.next() {
                let cleaned: String = location
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect();
                if !cleaned.is_empty() {
                    return cleaned;
                }
            }
            break;
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn personal_name_query() {
        assert_eq!(resolve("What is my name?"), "personal_name");
        assert_eq!(resolve("who am I"), "personal_name");
    }

    #[test]
    fn personal_color_query() {
        assert_eq!(resolve("what is my favorite color?"), "personal_color");
        assert_eq!(resolve("which color do I like?"), "personal_color");
    }

    #[test]
    fn personal_work_query() {
        assert_eq!(resolve("Where do I work?"), "personal_work");
        assert_eq!(resolve("who do i work for?"), "personal_work");
    }

    #[test]
    fn ceo_resignation_composite_topic() {
        assert_eq!(
            resolve("any updates on our CEO's resignation?"),
            "CEO resignation"
        );
    }

    #[test]
    fn weather_with_location() {
        assert_eq!(resolve("What is the weather in Paris?"), "weather_paris");
        assert_eq!(resolve("weather in London, today"), "weather_london");
    }

    #[test]
    fn weather_without_location() {
        assert_eq!(resolve("any weather updates"), "weather_unknown");
    }

    #[test]
    fn stock_query() {
        assert_eq!(resolve("What is the Tesla stock doing?"), "stock_price");
    }

    #[test]
    fn fallback_truncates_to_50_chars() {
        let query = "tell me everything about the history of the french revolution please";
        let topic = resolve(query);
        assert_eq!(topic.chars().count(), 50);
        assert!(query.starts_with(&topic));
    }

    #[test]
    fn fallback_collision_is_accepted() {
        let prefix = "a".repeat(50);
        let q1 = format!("{prefix} first tail");
        let q2 = format!("{prefix} second tail");
        assert_eq!(resolve(&q1), resolve(&q2));
    }

    #[test]
    fn empty_query_resolves_to_general() {
        assert_eq!(resolve(""), "general");
        assert_eq!(resolve("   "), "general");
    }

    #[test]
    fn generic_personal_heuristic() {
        assert!(is_personal_query("do you remember where i live?"));
        // No question mark.
        assert!(!is_personal_query("i live in Berlin"));
        // No first-person pronoun.
        assert!(!is_personal_query("what is a name?"));
    }

    proptest! {
        #[test]
        fn resolve_is_total_and_non_empty(query in ".*") {
            let topic = resolve(&query);
            prop_assert!(!topic.is_empty());
        }

        #[test]
        fn resolve_is_deterministic(query in ".*") {
            prop_assert_eq!(resolve(&query), resolve(&query));
        }
    }
}
