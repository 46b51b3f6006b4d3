// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The turn engine: sequences one conversational turn end to end.
//!
//! Topic resolution, tracker reads, context analysis, optional web search,
//! prompt composition, generation, then tracker and fact-store writes. Every
//! collaborator failure short of answer generation degrades silently; only a
//! failed generation call changes what the user sees.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use mnema_config::MnemaConfig;
use mnema_context::{
    compose, extract_facts_from_response, should_track_response, ContextAnalyzer,
    ConversationTracker, LlmClassifier, RetryingClassifier,
};
use mnema_core::types::{now_timestamp, ProviderMessage, ProviderRequest, WebPage};
use mnema_core::{DocumentIndex, EmbeddingAdapter, ProviderAdapter, WebSearchAdapter};
use mnema_memory::{FactExtractor, FactStore};

/// The only user-visible failure message: total answer-generation failure.
const GENERATION_FALLBACK: &str = "I encountered an error, please try again.";

/// Processes conversational turns for any number of threads.
///
/// Trackers are created lazily per thread and kept for the engine's
/// lifetime; independent threads never observe each other's records.
pub struct TurnEngine {
    config: MnemaConfig,
    index: Arc<dyn DocumentIndex>,
    provider: Arc<dyn ProviderAdapter>,
    analyzer: ContextAnalyzer,
    store: FactStore,
    web: Option<Arc<dyn WebSearchAdapter>>,
    trackers: DashMap<String, Arc<ConversationTracker>>,
}

impl TurnEngine {
    /// Wire up the engine from its collaborator adapters.
    ///
    /// `classifier_provider` serves the cheap structured calls (query
    /// classification and fact extraction); `provider` serves answer
    /// generation. They may be the same adapter.
    pub fn new(
        config: MnemaConfig,
        index: Arc<dyn DocumentIndex>,
        provider: Arc<dyn ProviderAdapter>,
        classifier_provider: Arc<dyn ProviderAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        web: Option<Arc<dyn WebSearchAdapter>>,
    ) -> Self {
        let extractor = FactExtractor::new(
            Arc::clone(&classifier_provider),
            config.provider.classifier_model.clone(),
        );
        let store = FactStore::new(
            Arc::clone(&index),
            embedder,
            extractor,
            config.memory.clone(),
            config.search.min_content_len,
        );
        let classifier = RetryingClassifier::new(
            Arc::new(LlmClassifier::new(
                classifier_provider,
                config.provider.classifier_model.clone(),
            )),
            &config.analyzer,
        );
        let analyzer = ContextAnalyzer::new(Arc::new(classifier));

        Self {
            config,
            index,
            provider,
            analyzer,
            store,
            web,
            trackers: DashMap::new(),
        }
    }

    /// Process one turn and return the assistant's answer.
    pub async fn handle_turn(&self, thread_id: &str, user_text: &str) -> String {
        let tracker = self.tracker(thread_id).await;
        let topic = mnema_context::topic::resolve(user_text);
        debug!(thread = thread_id, topic = %topic, "Handling turn");

        let user = self.store.get_user_context(thread_id).await;
        let analysis = self
            .analyzer
            .analyze(user_text, &topic, &tracker, &user)
            .await;

        let web_results = if analysis.requires_search {
            self.search_web(thread_id, &topic, &analysis.enhanced_query)
                .await
        } else {
            Vec::new()
        };

        // Retrieval runs after web storage so the composer sees the fresh
        // content it just fetched.
        let memories = self
            .store
            .retrieve(
                thread_id,
                &analysis.enhanced_query,
                self.config.memory.retrieval_k,
            )
            .await;
        let system_prompt = compose(&analysis, &memories, &web_results);

        let request = ProviderRequest {
            model: self.config.provider.model.clone(),
            system_prompt: Some(system_prompt),
            messages: vec![ProviderMessage {
                role: "user".to_string(),
                content: user_text.to_string(),
            }],
            max_tokens: self.config.provider.max_tokens,
        };
        let response = match self.provider.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                error!("Answer generation failed: {e}");
                return GENERATION_FALLBACK.to_string();
            }
        };

        self.record_turn(&tracker, thread_id, &topic, user_text, &response, &web_results)
            .await;
        response
    }

    /// Run the web search collaborator and persist what it found. A search
    /// failure is the same as no results.
    async fn search_web(&self, thread_id: &str, topic: &str, query: &str) -> Vec<WebPage> {
        let Some(web) = &self.web else {
            return Vec::new();
        };
        let pages = match web
            .search_and_scrape(query, self.config.search.max_results)
            .await
        {
            Ok(pages) => pages,
            Err(e) => {
                warn!("Web search failed, continuing without results: {e}");
                return Vec::new();
            }
        };
        if !pages.is_empty() {
            let stored = self.store.store_web_content(thread_id, topic, &pages).await;
            info!(stored, topic, "Stored web results");
        }
        pages
    }

    /// Post-response bookkeeping: mine shared facts, persist the turn,
    /// ingest the user message, and update preferences. All best effort.
    async fn record_turn(
        &self,
        tracker: &ConversationTracker,
        thread_id: &str,
        topic: &str,
        user_text: &str,
        response: &str,
        web_results: &[WebPage],
    ) {
        let mut fact_ids = Vec::new();
        if should_track_response(response) {
            for fact in extract_facts_from_response(topic, response) {
                if let Some(id) = tracker
                    .add_shared_fact(topic, &fact.text, "conversation", f64::from(fact.importance))
                    .await
                {
                    fact_ids.push(id);
                }
            }
        }

        let sources: Vec<String> = web_results.iter().map(|p| p.url.clone()).collect();
        // The turn record is never skipped, even with nothing shared.
        tracker
            .add_conversation_turn(topic, user_text, response, &sources, &fact_ids)
            .await;

        self.store.store_user_message(thread_id, user_text).await;
        self.update_preferences(tracker, topic, user_text, response)
            .await;
    }

    async fn update_preferences(
        &self,
        tracker: &ConversationTracker,
        topic: &str,
        user_text: &str,
        response: &str,
    ) {
        let lower = user_text.to_lowercase();
        if lower.contains("brief") || lower.contains("summary") {
            tracker.update_preference("response_style", "concise").await;
        } else if lower.contains("detail") || lower.contains("explain") {
            tracker.update_preference("response_style", "detailed").await;
        }
        let pattern = serde_json::json!({
            "topic": topic,
            "query_length": user_text.chars().count(),
            "response_length": response.chars().count(),
            "timestamp": now_timestamp(),
        });
        tracker
            .update_preference("query_patterns", &pattern.to_string())
            .await;
        tracker.increment_interaction_count().await;
    }

    /// The tracker for a thread, loading it on first use.
    pub async fn tracker(&self, thread_id: &str) -> Arc<ConversationTracker> {
        if let Some(tracker) = self.trackers.get(thread_id) {
            return Arc::clone(&tracker);
        }
        let tracker = Arc::new(
            ConversationTracker::load(
                Arc::clone(&self.index),
                thread_id,
                self.config.memory.load_page_size,
            )
            .await,
        );
        self.trackers
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::clone(&tracker));
        tracker
    }

    /// The fact store, for callers that ingest outside a turn.
    pub fn store(&self) -> &FactStore {
        &self.store
    }
}
