// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-thread conversation ledger: shared facts, turns, last-discussion
//! times, and user preferences.
//!
//! The tracker keeps an in-process cache that is populated from the index at
//! construction, so a fresh instance is immediately queryable. The cache is
//! authoritative once loaded; the index is the source of truth on cold
//! start. Read failures degrade to cached or empty results, write failures
//! log and return a sentinel; the conversation proceeds either way.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use mnema_core::types::{
    now_timestamp, Document, DocumentFilter, OrderBy, SearchRequest,
};
use mnema_core::DocumentIndex;
use mnema_memory::{content_hash, truncate_chars};

/// Record type for facts already surfaced to the user.
pub const RECORD_TYPE_SHARED_FACT: &str = "shared_fact";
/// Record type for conversation turns.
pub const RECORD_TYPE_TURN: &str = "conversation_turn";
/// Record type for user preference key/value records.
pub const RECORD_TYPE_PREFERENCE: &str = "user_preference";

/// A fact that has already been surfaced to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedFact {
    pub id: String,
    pub topic: String,
    pub text: String,
    pub source: String,
    pub confidence: f64,
    /// When the fact was first surfaced.
    pub shared_at: String,
}

/// One query/response exchange. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub id: String,
    pub topic: String,
    pub query: String,
    pub response: String,
    pub sources: Vec<String>,
    pub fact_ids: Vec<String>,
    pub timestamp: String,
}

/// Per-topic rollup of what has been shared so far.
#[derive(Debug, Clone, PartialEq)]
pub struct FactsSummary {
    pub topic: String,
    pub count: usize,
    pub first_shared_at: Option<String>,
    pub last_shared_at: Option<String>,
    /// Up to three most recently shared fact texts.
    pub recent_facts: Vec<String>,
}

/// Thread-level rollup across all topics.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub topic_count: usize,
    pub interaction_count: u64,
}

/// Provenance metadata carried in a shared-fact document's summary field.
#[derive(Debug, Serialize, Deserialize)]
struct FactMeta {
    source: String,
    confidence: f64,
}

/// Turn payload serialized into a turn document's content field.
#[derive(Debug, Serialize, Deserialize)]
struct TurnRecord {
    query: String,
    response: String,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    fact_ids: Vec<String>,
}

#[derive(Default)]
struct TrackerState {
    /// Shared facts keyed by content hash.
    facts: HashMap<String, SharedFact>,
    preferences: HashMap<String, String>,
    /// Topic key to most recent turn/fact timestamp.
    last_discussed: HashMap<String, String>,
    topics: HashSet<String>,
}

/// Durable per-thread record of facts, turns, and preferences.
pub struct ConversationTracker {
    thread_id: String,
    index: Arc<dyn DocumentIndex>,
    load_page_size: usize,
    state: RwLock<TrackerState>,
}

impl ConversationTracker {
    /// Construct a tracker and populate its caches from the index.
    pub async fn load(
        index: Arc<dyn DocumentIndex>,
        thread_id: impl Into<String>,
        load_page_size: usize,
    ) -> Self {
        let tracker = Self {
            thread_id: thread_id.into(),
            index,
            load_page_size,
            state: RwLock::new(TrackerState::default()),
        };
        tracker.load_historical().await;
        tracker
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Clear caches and reload from the index.
    pub async fn refresh(&self) {
        *self.state.write().await = TrackerState::default();
        self.load_historical().await;
    }

    async fn load_historical(&self) {
        let turns = self
            .search_or_empty(self.filtered(RECORD_TYPE_TURN, None, None))
            .await;
        let facts = self
            .search_or_empty(self.filtered(RECORD_TYPE_SHARED_FACT, None, None))
            .await;
        let preferences = self
            .search_or_empty(self.filtered(RECORD_TYPE_PREFERENCE, None, None))
            .await;

        let mut state = self.state.write().await;
        // Results are most recent first, so the first timestamp seen per
        // topic is the latest.
        for doc in &turns {
            if let Some(topic) = &doc.topic {
                state.topics.insert(topic.clone());
                state
                    .last_discussed
                    .entry(topic.clone())
                    .or_insert_with(|| doc.timestamp.clone());
            }
        }
        for doc in facts {
            if let Some(topic) = &doc.topic {
                state.topics.insert(topic.clone());
            }
            let fact = shared_fact_from_doc(&doc);
            let hash = doc
                .content_hash
                .unwrap_or_else(|| content_hash(&fact.text));
            state.facts.insert(hash, fact);
        }
        for doc in preferences {
            if let Some(key) = doc.title {
                state.preferences.insert(key, doc.content);
            }
        }
        debug!(
            thread = %self.thread_id,
            turns = turns.len(),
            facts = state.facts.len(),
            preferences = state.preferences.len(),
            "Loaded historical conversation state"
        );
    }

    /// Record a fact as surfaced to the user.
    ///
    /// Idempotent under exact duplication: an existing fact with the same
    /// content hash returns its id without a new write. Returns `None` on
    /// persistence failure; the caller treats that as "not tracked" and
    /// continues the turn.
    pub async fn add_shared_fact(
        &self,
        topic: &str,
        fact_text: &str,
        source: &str,
        confidence: f64,
    ) -> Option<String> {
        let hash = content_hash(fact_text);

        if let Some(existing) = self.state.read().await.facts.get(&hash) {
            return Some(existing.id.clone());
        }

        // Cache may be cold for facts written by a previous process.
        let mut filter = self.base_filter(RECORD_TYPE_SHARED_FACT);
        filter.content_hash = Some(hash.clone());
        if let Ok(results) = self
            .index
            .search(SearchRequest::filtered(filter, 1))
            .await
        {
            if let Some(hit) = results.into_iter().next() {
                let fact = shared_fact_from_doc(&hit.document);
                let id = fact.id.clone();
                self.state.write().await.facts.insert(hash, fact);
                return Some(id);
            }
        }

        let timestamp = now_timestamp();
        let meta = FactMeta {
            source: source.to_string(),
            confidence,
        };
        let document = Document {
            id: Uuid::new_v4().to_string(),
            content: fact_text.to_string(),
            embedding: Vec::new(),
            category: "fact".to_string(),
            summary: serde_json::to_string(&meta).unwrap_or_default(),
            content_hash: Some(hash.clone()),
            timestamp: timestamp.clone(),
            source_url: None,
            title: None,
            topic: Some(topic.to_string()),
            thread_id: Some(self.thread_id.clone()),
            record_type: Some(RECORD_TYPE_SHARED_FACT.to_string()),
        };
        let id = document.id.clone();

        match self.index.upsert(document).await {
            Ok(()) => {
                let mut state = self.state.write().await;
                state.facts.insert(
                    hash,
                    SharedFact {
                        id: id.clone(),
                        topic: topic.to_string(),
                        text: fact_text.to_string(),
                        source: source.to_string(),
                        confidence,
                        shared_at: timestamp.clone(),
                    },
                );
                state.topics.insert(topic.to_string());
                state.last_discussed.insert(topic.to_string(), timestamp);
                Some(id)
            }
            Err(e) => {
                warn!("Failed to persist shared fact, not tracked: {e}");
                None
            }
        }
    }

    /// Shared facts for a topic, most recent first.
    ///
    /// Served from cache when no temporal filter is requested and the cache
    /// has entries for the topic; otherwise queries the index and refreshes
    /// the cache.
    pub async fn get_shared_facts(&self, topic: &str, after: Option<&str>) -> Vec<SharedFact> {
        if after.is_none() {
            let mut cached: Vec<SharedFact> = self
                .state
                .read()
                .await
                .facts
                .values()
                .filter(|f| f.topic == topic)
                .cloned()
                .collect();
            if !cached.is_empty() {
                cached.sort_by(|a, b| b.shared_at.cmp(&a.shared_at));
                return cached;
            }
        }

        let request = self.filtered(RECORD_TYPE_SHARED_FACT, Some(topic), after);
        match self.index.search(request).await {
            Ok(results) => {
                let facts: Vec<SharedFact> = results
                    .iter()
                    .map(|s| shared_fact_from_doc(&s.document))
                    .collect();
                let mut state = self.state.write().await;
                for fact in &facts {
                    state.facts.insert(content_hash(&fact.text), fact.clone());
                }
                facts
            }
            Err(e) => {
                warn!("Shared fact query failed, degrading to cache: {e}");
                let mut cached: Vec<SharedFact> = self
                    .state
                    .read()
                    .await
                    .facts
                    .values()
                    .filter(|f| f.topic == topic)
                    .cloned()
                    .collect();
                cached.sort_by(|a, b| b.shared_at.cmp(&a.shared_at));
                cached
            }
        }
    }

    /// Record a completed turn. Never skipped: the turn is persisted even
    /// when no facts were shared, and the last-discussion time and topic set
    /// are updated even when the write fails.
    pub async fn add_conversation_turn(
        &self,
        topic: &str,
        query: &str,
        response: &str,
        sources: &[String],
        fact_ids: &[String],
    ) -> Option<String> {
        let record = TurnRecord {
            query: query.to_string(),
            response: response.to_string(),
            sources: sources.to_vec(),
            fact_ids: fact_ids.to_vec(),
        };
        let timestamp = now_timestamp();
        let document = Document {
            id: Uuid::new_v4().to_string(),
            content: serde_json::to_string(&record).unwrap_or_default(),
            embedding: Vec::new(),
            category: "conversation".to_string(),
            summary: truncate_chars(query, 200).to_string(),
            content_hash: None,
            timestamp: timestamp.clone(),
            source_url: None,
            title: None,
            topic: Some(topic.to_string()),
            thread_id: Some(self.thread_id.clone()),
            record_type: Some(RECORD_TYPE_TURN.to_string()),
        };
        let id = document.id.clone();

        let persisted = match self.index.upsert(document).await {
            Ok(()) => Some(id),
            Err(e) => {
                warn!("Failed to persist conversation turn: {e}");
                None
            }
        };

        let mut state = self.state.write().await;
        state.topics.insert(topic.to_string());
        state.last_discussed.insert(topic.to_string(), timestamp);
        persisted
    }

    /// Turns for a topic in chronological order (oldest first).
    pub async fn get_conversation_history(
        &self,
        topic: &str,
        limit: usize,
    ) -> Vec<ConversationTurn> {
        let mut request = self.filtered(RECORD_TYPE_TURN, Some(topic), None);
        request.top = limit;
        let docs = self.search_or_empty(request).await;

        let mut turns: Vec<ConversationTurn> = docs
            .into_iter()
            .filter_map(|doc| turn_from_doc(doc, topic))
            .collect();
        turns.reverse();
        turns
    }

    /// When the topic was last discussed. Cache-first with a single-row
    /// index fallback; the fallback result is cached.
    pub async fn get_last_discussion_time(&self, topic: &str) -> Option<String> {
        if let Some(t) = self.state.read().await.last_discussed.get(topic) {
            return Some(t.clone());
        }

        let mut request = self.filtered(RECORD_TYPE_TURN, Some(topic), None);
        request.top = 1;
        let timestamp = self
            .search_or_empty(request)
            .await
            .into_iter()
            .next()
            .map(|doc| doc.timestamp)?;
        self.state
            .write()
            .await
            .last_discussed
            .insert(topic.to_string(), timestamp.clone());
        Some(timestamp)
    }

    /// All topics discussed in this thread, sorted.
    pub async fn get_all_topics(&self) -> Vec<String> {
        {
            let state = self.state.read().await;
            if !state.topics.is_empty() {
                let mut topics: Vec<String> = state.topics.iter().cloned().collect();
                topics.sort();
                return topics;
            }
        }

        let docs = self
            .search_or_empty(self.filtered(RECORD_TYPE_TURN, None, None))
            .await;
        let derived: HashSet<String> = docs.into_iter().filter_map(|d| d.topic).collect();
        let mut state = self.state.write().await;
        state.topics.extend(derived.iter().cloned());
        let mut topics: Vec<String> = derived.into_iter().collect();
        topics.sort();
        topics
    }

    /// Upsert a preference. Last write wins per key. The cache is updated
    /// even when the persistence write fails: in-process correctness
    /// matters more than durability on a transient failure.
    pub async fn update_preference(&self, key: &str, value: &str) {
        let document = Document {
            id: format!(
                "pref_{}_{}",
                encode_key(&self.thread_id),
                encode_key(key)
            ),
            content: value.to_string(),
            embedding: Vec::new(),
            category: "preference".to_string(),
            summary: String::new(),
            content_hash: None,
            timestamp: now_timestamp(),
            source_url: None,
            title: Some(key.to_string()),
            topic: None,
            thread_id: Some(self.thread_id.clone()),
            record_type: Some(RECORD_TYPE_PREFERENCE.to_string()),
        };
        if let Err(e) = self.index.upsert(document).await {
            warn!("Failed to persist preference '{key}', cache only: {e}");
        }
        self.state
            .write()
            .await
            .preferences
            .insert(key.to_string(), value.to_string());
    }

    /// All preferences, from the cache populated at construction.
    pub async fn get_user_preferences(&self) -> HashMap<String, String> {
        self.state.read().await.preferences.clone()
    }

    /// Bump the interaction counter preference.
    pub async fn increment_interaction_count(&self) {
        let count: u64 = self
            .state
            .read()
            .await
            .preferences
            .get("interaction_count")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        self.update_preference("interaction_count", &(count + 1).to_string())
            .await;
    }

    /// Rollup of the shared facts for one topic.
    pub async fn get_facts_summary(&self, topic: &str) -> FactsSummary {
        let facts = self.get_shared_facts(topic, None).await;
        FactsSummary {
            topic: topic.to_string(),
            count: facts.len(),
            // Facts are most recent first.
            first_shared_at: facts.last().map(|f| f.shared_at.clone()),
            last_shared_at: facts.first().map(|f| f.shared_at.clone()),
            recent_facts: facts.iter().take(3).map(|f| f.text.clone()).collect(),
        }
    }

    /// Rollup across the whole thread.
    pub async fn get_conversation_summary(&self) -> ConversationSummary {
        let state = self.state.read().await;
        ConversationSummary {
            topic_count: state.topics.len(),
            interaction_count: state
                .preferences
                .get("interaction_count")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }

    fn base_filter(&self, record_type: &str) -> DocumentFilter {
        DocumentFilter {
            thread_id: Some(self.thread_id.clone()),
            record_type: Some(record_type.to_string()),
            ..Default::default()
        }
    }

    fn filtered(
        &self,
        record_type: &str,
        topic: Option<&str>,
        after: Option<&str>,
    ) -> SearchRequest {
        let mut filter = self.base_filter(record_type);
        filter.topic = topic.map(str::to_string);
        filter.timestamp_after = after.map(str::to_string);
        SearchRequest {
            filter,
            vector: None,
            order_by: Some(OrderBy::TimestampDesc),
            top: self.load_page_size,
        }
    }

    async fn search_or_empty(&self, request: SearchRequest) -> Vec<Document> {
        match self.index.search(request).await {
            Ok(results) => results.into_iter().map(|s| s.document).collect(),
            Err(e) => {
                warn!("Tracker read failed, degrading to empty: {e}");
                Vec::new()
            }
        }
    }
}

fn shared_fact_from_doc(doc: &Document) -> SharedFact {
    let meta: FactMeta = serde_json::from_str(&doc.summary).unwrap_or(FactMeta {
        source: "unknown".to_string(),
        confidence: 0.5,
    });
    SharedFact {
        id: doc.id.clone(),
        topic: doc.topic.clone().unwrap_or_default(),
        text: doc.content.clone(),
        source: meta.source,
        confidence: meta.confidence,
        shared_at: doc.timestamp.clone(),
    }
}

fn turn_from_doc(doc: Document, topic: &str) -> Option<ConversationTurn> {
    let record: TurnRecord = match serde_json::from_str(&doc.content) {
        Ok(record) => record,
        Err(e) => {
            debug!("Skipping unparseable turn record {}: {e}", doc.id);
            return None;
        }
    };
    Some(ConversationTurn {
        id: doc.id,
        topic: topic.to_string(),
        query: record.query,
        response: record.response,
        sources: record.sources,
        fact_ids: record.fact_ids,
        timestamp: doc.timestamp,
    })
}

/// Encode a preference key for use inside a document id. Common separators
/// map to underscores; anything else falls back to URL-safe base64.
fn encode_key(key: &str) -> String {
    let replaced: String = key
        .chars()
        .map(|c| if matches!(c, '.' | ':' | '/') { '_' } else { c })
        .collect();
    if replaced
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        replaced
    } else {
        URL_SAFE_NO_PAD.encode(key.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mnema_config::StorageConfig;
    use mnema_core::types::{AdapterType, HealthStatus, ScoredDocument};
    use mnema_core::{MnemaError, PluginAdapter};
    use mnema_storage::SqliteIndex;
    use std::time::Duration;

    async fn index() -> Arc<dyn DocumentIndex> {
        let index = SqliteIndex::new(StorageConfig::default());
        index.initialize_in_memory().await.unwrap();
        Arc::new(index)
    }

    async fn tracker_over(index: Arc<dyn DocumentIndex>) -> ConversationTracker {
        ConversationTracker::load(index, "t1", 1000).await
    }

    #[tokio::test]
    async fn shared_fact_is_idempotent_under_duplication() {
        let tracker = tracker_over(index().await).await;

        let first = tracker
            .add_shared_fact("news", "The CEO resigned", "conversation", 0.8)
            .await
            .unwrap();
        let second = tracker
            .add_shared_fact("news", "the ceo resigned", "conversation", 0.8)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(tracker.get_shared_facts("news", None).await.len(), 1);
    }

    #[tokio::test]
    async fn shared_facts_most_recent_first() {
        let tracker = tracker_over(index().await).await;
        tracker
            .add_shared_fact("news", "Fact one", "user", 0.9)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker
            .add_shared_fact("news", "Fact two", "user", 0.9)
            .await
            .unwrap();

        let facts = tracker.get_shared_facts("news", None).await;
        assert_eq!(facts[0].text, "Fact two");
        assert_eq!(facts[1].text, "Fact one");
    }

    #[tokio::test]
    async fn temporal_filter_is_strict() {
        let tracker = tracker_over(index().await).await;
        tracker
            .add_shared_fact("news", "Old fact", "user", 0.9)
            .await
            .unwrap();
        let cutoff = tracker.get_shared_facts("news", None).await[0]
            .shared_at
            .clone();

        // A fact shared at exactly the cutoff is not "after" it.
        let after = tracker.get_shared_facts("news", Some(&cutoff)).await;
        assert!(after.is_empty());

        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker
            .add_shared_fact("news", "New fact", "user", 0.9)
            .await
            .unwrap();
        let after = tracker.get_shared_facts("news", Some(&cutoff)).await;
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].text, "New fact");
    }

    #[tokio::test]
    async fn conversation_history_round_trip_chronological() {
        let tracker = tracker_over(index().await).await;
        tracker
            .add_conversation_turn("news", "q1", "r1", &[], &[])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let sources = vec!["https://example.com".to_string()];
        tracker
            .add_conversation_turn("news", "q2", "r2", &sources, &["f1".to_string()])
            .await
            .unwrap();

        let history = tracker.get_conversation_history("news", 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].query, "q1");
        assert_eq!(history[1].query, "q2");
        assert!(history[0].timestamp <= history[1].timestamp);
        assert_eq!(history[1].sources, sources);
        assert_eq!(history[1].fact_ids, vec!["f1".to_string()]);
    }

    #[tokio::test]
    async fn turn_updates_last_discussion_time_and_topics() {
        let tracker = tracker_over(index().await).await;
        assert!(tracker.get_last_discussion_time("weather_paris").await.is_none());

        tracker
            .add_conversation_turn("weather_paris", "q", "r", &[], &[])
            .await;
        assert!(tracker.get_last_discussion_time("weather_paris").await.is_some());
        assert_eq!(tracker.get_all_topics().await, vec!["weather_paris"]);
    }

    #[tokio::test]
    async fn historical_load_populates_caches() {
        let index = index().await;
        {
            let tracker = tracker_over(Arc::clone(&index)).await;
            tracker
                .add_shared_fact("news", "The CEO resigned", "conversation", 0.8)
                .await
                .unwrap();
            tracker
                .add_conversation_turn("news", "q", "r", &[], &[])
                .await;
            tracker.update_preference("response_style", "concise").await;
        }

        // A new tracker over the same index is immediately queryable.
        let tracker = tracker_over(index).await;
        assert_eq!(tracker.get_all_topics().await, vec!["news"]);
        assert!(tracker.get_last_discussion_time("news").await.is_some());
        assert_eq!(tracker.get_shared_facts("news", None).await.len(), 1);
        assert_eq!(
            tracker.get_user_preferences().await.get("response_style"),
            Some(&"concise".to_string())
        );
    }

    #[tokio::test]
    async fn preferences_last_write_wins() {
        let tracker = tracker_over(index().await).await;
        tracker.update_preference("response_style", "concise").await;
        tracker.update_preference("response_style", "detailed").await;

        let preferences = tracker.get_user_preferences().await;
        assert_eq!(
            preferences.get("response_style"),
            Some(&"detailed".to_string())
        );
    }

    #[tokio::test]
    async fn interaction_count_increments() {
        let tracker = tracker_over(index().await).await;
        tracker.increment_interaction_count().await;
        tracker.increment_interaction_count().await;
        assert_eq!(
            tracker.get_user_preferences().await.get("interaction_count"),
            Some(&"2".to_string())
        );
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let index = index().await;
        let a = ConversationTracker::load(Arc::clone(&index), "thread-a", 1000).await;
        let b = ConversationTracker::load(index, "thread-b", 1000).await;

        a.add_shared_fact("news", "A's fact", "user", 0.9).await.unwrap();
        assert!(b.get_shared_facts("news", None).await.is_empty());
        assert!(b.get_all_topics().await.is_empty());
    }

    #[tokio::test]
    async fn refresh_reloads_from_index() {
        let index = index().await;
        let tracker = tracker_over(Arc::clone(&index)).await;

        // Another instance writes behind this tracker's back.
        let other = tracker_over(Arc::clone(&index)).await;
        other
            .add_shared_fact("news", "Background fact", "user", 0.9)
            .await
            .unwrap();

        tracker.refresh().await;
        assert_eq!(tracker.get_shared_facts("news", None).await.len(), 1);
    }

    #[tokio::test]
    async fn facts_summary_rolls_up_a_topic() {
        let tracker = tracker_over(index().await).await;

        let empty = tracker.get_facts_summary("news").await;
        assert_eq!(empty.count, 0);
        assert!(empty.first_shared_at.is_none());

        tracker.add_shared_fact("news", "Fact one", "user", 0.9).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker.add_shared_fact("news", "Fact two", "user", 0.9).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker.add_shared_fact("news", "Fact three", "user", 0.9).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker.add_shared_fact("news", "Fact four", "user", 0.9).await.unwrap();

        let summary = tracker.get_facts_summary("news").await;
        assert_eq!(summary.count, 4);
        assert!(summary.first_shared_at < summary.last_shared_at);
        assert_eq!(
            summary.recent_facts,
            vec!["Fact four", "Fact three", "Fact two"]
        );
    }

    #[tokio::test]
    async fn conversation_summary_counts_topics_and_interactions() {
        let tracker = tracker_over(index().await).await;
        tracker
            .add_conversation_turn("news", "q", "r", &[], &[])
            .await;
        tracker
            .add_conversation_turn("weather_paris", "q", "r", &[], &[])
            .await;
        tracker.increment_interaction_count().await;
        tracker.increment_interaction_count().await;

        let summary = tracker.get_conversation_summary().await;
        assert_eq!(summary.topic_count, 2);
        assert_eq!(summary.interaction_count, 2);
    }

    #[tokio::test]
    async fn preference_ids_encode_the_thread_id() {
        let index = index().await;
        let tracker =
            ConversationTracker::load(Arc::clone(&index), "user:42/web", 1000).await;
        tracker.update_preference("response_style", "concise").await;

        let results = index
            .search(SearchRequest::filtered(
                DocumentFilter {
                    thread_id: Some("user:42/web".to_string()),
                    record_type: Some(RECORD_TYPE_PREFERENCE.to_string()),
                    ..Default::default()
                },
                10,
            ))
            .await
            .unwrap();
        let id = &results[0].document.id;
        assert!(id.starts_with("pref_"), "id was: {id}");
        assert!(!id.contains(':') && !id.contains('/'), "id was: {id}");

        // Reloading still finds the preference under the raw thread id.
        let reloaded = ConversationTracker::load(index, "user:42/web", 1000).await;
        assert_eq!(
            reloaded.get_user_preferences().await.get("response_style"),
            Some(&"concise".to_string())
        );
    }

    #[test]
    fn encode_key_handles_separators_and_unicode() {
        assert_eq!(encode_key("response_style"), "response_style");
        assert_eq!(encode_key("a.b:c/d"), "a_b_c_d");
        let encoded = encode_key("clé spéciale");
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    /// An index whose every operation fails, for degradation-path tests.
    struct FailingIndex;

    #[async_trait]
    impl PluginAdapter for FailingIndex {
        fn name(&self) -> &str {
            "failing-index"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Storage
        }
        async fn health_check(&self) -> Result<HealthStatus, MnemaError> {
            Ok(HealthStatus::Unhealthy("always fails".to_string()))
        }
        async fn shutdown(&self) -> Result<(), MnemaError> {
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentIndex for FailingIndex {
        async fn upsert(&self, _document: Document) -> Result<(), MnemaError> {
            Err(MnemaError::Internal("write failed".to_string()))
        }
        async fn search(&self, _request: SearchRequest) -> Result<Vec<ScoredDocument>, MnemaError> {
            Err(MnemaError::Internal("read failed".to_string()))
        }
        async fn delete(&self, _ids: &[String]) -> Result<(), MnemaError> {
            Err(MnemaError::Internal("delete failed".to_string()))
        }
    }

    #[tokio::test]
    async fn write_failures_degrade_without_raising() {
        let tracker = ConversationTracker::load(Arc::new(FailingIndex), "t1", 1000).await;

        // Fact write failure returns the "not tracked" sentinel.
        let id = tracker
            .add_shared_fact("news", "Some fact", "user", 0.9)
            .await;
        assert!(id.is_none());

        // Preference cache is updated even though persistence failed.
        tracker.update_preference("response_style", "concise").await;
        assert_eq!(
            tracker.get_user_preferences().await.get("response_style"),
            Some(&"concise".to_string())
        );

        // Reads degrade to empty.
        assert!(tracker.get_conversation_history("news", 10).await.is_empty());
        assert!(tracker.get_all_topics().await.is_empty());
    }
}
