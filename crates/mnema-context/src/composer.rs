// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly and response post-processing.
//!
//! `compose` builds the system instructions handed to the generation model:
//! personal facts first, then prior-conversation snippets, then web content,
//! followed by the analyzer's suppression and temporal instructions.
//! The response side mines the model's answer for new atomic facts, unless
//! the answer is a "no new updates" decline, which is never mined.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use mnema_core::types::{parse_timestamp, ScoredDocument, WebPage};
use mnema_memory::{
    truncate_chars, CandidateFact, FactKind, CATEGORY_PERSONAL_FACT, CATEGORY_USER_MESSAGE,
    CATEGORY_WEB_CONTENT,
};

use crate::analyzer::QueryAnalysis;
use crate::classifier::TEMPORAL_UPDATE_SINCE_LAST;

/// Max prior-conversation snippets in the prompt.
const MAX_CONTEXT_SNIPPETS: usize = 3;
/// Max web results in the prompt.
const MAX_WEB_RESULTS: usize = 3;
/// Snippet truncation length.
const SNIPPET_LEN: usize = 150;
/// Web content truncation length.
const WEB_CONTENT_LEN: usize = 1000;
/// Cap on facts mined from a single response.
const MAX_RESPONSE_FACTS: usize = 5;

/// Phrases that mark a response as declining to provide new information.
/// Such responses are never mined for facts.
const NO_TRACK_PHRASES: &[&str] = &[
    "i don't have any new updates",
    "there are no new updates",
    "no new information",
    "i don't have that information",
];

/// Build the system prompt for the generation model.
pub fn compose(
    analysis: &QueryAnalysis,
    memories: &[ScoredDocument],
    web_results: &[WebPage],
) -> String {
    let facts_block = format_memories(memories);

    if analysis.is_personal_query && web_results.is_empty() {
        let mut prompt = facts_block;
        prompt.push_str(
            "This is a personal fact query. Simply state the requested information if available.\n\
             Do not mention updates or new information.\n\
             If the information is not available, say you don't have that information.\n",
        );
        return prompt;
    }

    let mut prompt = facts_block;

    if !analysis.exclude_facts.is_empty()
        && analysis.temporal_requirement == TEMPORAL_UPDATE_SINCE_LAST
    {
        prompt.push_str("DO NOT REPEAT the following information the user has already been told:\n");
        for fact in &analysis.exclude_facts {
            prompt.push_str(&format!("- {fact}\n"));
        }
        prompt.push_str(
            "If asked for updates and you only have the above information, \
             clearly state that there are no new updates.\n",
        );
    }

    if let Some(date) = analysis
        .last_discussed
        .as_deref()
        .and_then(parse_timestamp)
    {
        prompt.push_str(&format!(
            "Only include information newer than {}.\n",
            date.format("%B %d, %Y")
        ));
    }

    if !analysis.prompt_instructions.is_empty() {
        prompt.push_str(&format!("{}\n", analysis.prompt_instructions));
    }
    if !analysis.user_intent.is_empty() {
        prompt.push_str(&format!("**User Intent:** {}\n", analysis.user_intent));
    }

    if analysis.temporal_requirement == TEMPORAL_UPDATE_SINCE_LAST && web_results.is_empty() {
        prompt.push_str(&format!(
            "If no new information is available, clearly state: \
             'I don't have any new updates on {} since our last discussion.'\n",
            analysis.topic
        ));
    }

    prompt
}

/// Format retrieved memories into the facts block.
///
/// Personal facts come first in the fixed label order, then prior
/// conversation snippets, then web content. Empty sections are omitted.
pub fn format_memories(memories: &[ScoredDocument]) -> String {
    let mut out = String::new();

    let personal: Vec<&ScoredDocument> = memories
        .iter()
        .filter(|m| m.document.category == CATEGORY_PERSONAL_FACT)
        .collect();
    if !personal.is_empty() {
        out.push_str("**User Facts:**\n");
        for kind in FactKind::ordered() {
            for memory in &personal {
                let doc_kind =
                    FactKind::from_str_value(memory.document.title.as_deref().unwrap_or(""));
                if doc_kind == kind {
                    out.push_str(&format!("- {}\n", memory.document.content));
                }
            }
        }
        out.push('\n');
    }

    let snippets: Vec<&ScoredDocument> = memories
        .iter()
        .filter(|m| m.document.category == CATEGORY_USER_MESSAGE)
        .take(MAX_CONTEXT_SNIPPETS)
        .collect();
    if !snippets.is_empty() {
        out.push_str("**Previous Conversation Context:**\n");
        for memory in snippets {
            let content = &memory.document.content;
            if content.chars().count() > SNIPPET_LEN {
                out.push_str(&format!("- {}...\n", truncate_chars(content, SNIPPET_LEN)));
            } else {
                out.push_str(&format!("- {content}\n"));
            }
        }
        out.push('\n');
    }

    let web: Vec<&ScoredDocument> = memories
        .iter()
        .filter(|m| m.document.category == CATEGORY_WEB_CONTENT)
        .take(MAX_WEB_RESULTS)
        .collect();
    if !web.is_empty() {
        out.push_str("**Current Web Information:**\n");
        for memory in web {
            let doc = &memory.document;
            let lower = doc.content.to_lowercase();
            if lower.contains("weather") || lower.contains("temperature") {
                out.push_str(&format!("**Weather Information:**\n{}\n", doc.content));
            } else {
                out.push_str(&format!(
                    "**{}**\nSource: {}\n{}\n",
                    doc.title.as_deref().unwrap_or("Untitled"),
                    doc.source_url.as_deref().unwrap_or("unknown"),
                    truncate_chars(&doc.content, WEB_CONTENT_LEN)
                ));
            }
        }
        out.push('\n');
    }

    out
}

/// Whether the response should be mined for new facts at all.
pub fn should_track_response(response: &str) -> bool {
    let lower = response.to_lowercase();
    !NO_TRACK_PHRASES.iter().any(|p| lower.contains(p))
}

/// Mine the model's answer for new atomic facts.
///
/// Personal topics use targeted patterns; everything else uses a
/// sentence-level heuristic. Negative statements are never facts.
pub fn extract_facts_from_response(topic: &str, response: &str) -> Vec<CandidateFact> {
    let lower = response.to_lowercase();
    if lower.contains("don't have") || lower.contains("no new") || lower.contains("not available")
    {
        debug!("Response declines to answer, not mining facts");
        return Vec::new();
    }

    let mut facts = Vec::new();

    if topic.starts_with("personal") {
        if let Some(name) = capture(&NAME_IS, &lower) {
            facts.push(CandidateFact {
                kind: FactKind::Name,
                text: format!("Name: {}", capitalize(&name)),
                importance: 0.9,
                replaces: None,
            });
        }
        if let Some(color) = capture(&FAVORITE_COLOR_IS, &lower) {
            facts.push(CandidateFact {
                kind: FactKind::Preference,
                text: format!("Favorite color: {color}"),
                importance: 0.9,
                replaces: None,
            });
        }
        facts.truncate(MAX_RESPONSE_FACTS);
        return facts;
    }

    for sentence in response.split('.') {
        if facts.len() >= MAX_RESPONSE_FACTS {
            break;
        }
        let sentence = sentence.trim();
        if sentence.chars().count() <= 20 {
            continue;
        }
        let sentence_lower = sentence.to_lowercase();
        let has_verb = [" is ", " are ", " was ", " were ", " will ", " has ", " have "]
            .iter()
            .any(|v| sentence_lower.contains(v));
        let blocked = ["i don't", "there are no", "i can", "if you"]
            .iter()
            .any(|b| sentence_lower.contains(b));
        if has_verb && !blocked {
            facts.push(CandidateFact {
                kind: FactKind::Other,
                text: sentence.to_string(),
                importance: 0.7,
                replaces: None,
            });
        }
    }

    facts
}

static NAME_IS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"name is (\w+)").unwrap());
static FAVORITE_COLOR_IS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"favorite color is (\w+)").unwrap());

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
