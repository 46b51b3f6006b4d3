// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Fact Store: durable atomic facts and memories, deduplicated by
//! content hash with a best-effort near-duplicate check, retrieved with
//! most-recent-wins collapsing per fact kind.
//!
//! Every operation here degrades instead of raising: a persistence or
//! embedding failure loses durability for one record, never the turn.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use mnema_config::MemoryConfig;
use mnema_core::types::{
    now_timestamp, Document, DocumentFilter, EmbeddingInput, ScoredDocument, SearchRequest,
    WebPage,
};
use mnema_core::{DocumentIndex, EmbeddingAdapter};

use crate::extractor::FactExtractor;
use crate::types::{content_hash, CandidateFact, FactKind, UserContext};

/// Memory category for extracted personal facts.
pub const CATEGORY_PERSONAL_FACT: &str = "personal_fact";
/// Memory category for raw user messages.
pub const CATEGORY_USER_MESSAGE: &str = "user_message";
/// Memory category for stored web search results.
pub const CATEGORY_WEB_CONTENT: &str = "web_content";
/// Record type shared by all memory documents.
pub const RECORD_TYPE_MEMORY: &str = "memory";

/// Length of the web-content summary prefix.
const WEB_SUMMARY_LEN: usize = 200;
/// Prefix length used for content-level dedup during retrieval.
const RETRIEVAL_DEDUP_PREFIX: usize = 100;

/// Persists and retrieves memories for a conversation thread.
pub struct FactStore {
    index: Arc<dyn DocumentIndex>,
    embedder: Arc<dyn EmbeddingAdapter>,
    extractor: FactExtractor,
    config: MemoryConfig,
    /// Web pages with less content than this are not worth storing.
    min_web_content_len: usize,
}

impl FactStore {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        embedder: Arc<dyn EmbeddingAdapter>,
        extractor: FactExtractor,
        config: MemoryConfig,
        min_web_content_len: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            extractor,
            config,
            min_web_content_len,
        }
    }

    /// Embed text, degrading to a zero vector on failure so the calling
    /// pipeline stays non-fatal. Vector search over a zero vector scores
    /// everything 0.0, which ranks as "no good matches".
    pub async fn embed_or_zero(&self, text: &str) -> Vec<f32> {
        let input = EmbeddingInput {
            texts: vec![text.to_string()],
        };
        match self.embedder.embed(input).await {
            Ok(output) => output
                .embeddings
                .into_iter()
                .next()
                .unwrap_or_else(|| vec![0.0; self.embedder.dimensions()]),
            Err(e) => {
                warn!("Embedding failed, degrading to zero vector: {e}");
                vec![0.0; self.embedder.dimensions()]
            }
        }
    }

    /// Extract personal facts from a user message and store them, then store
    /// the raw message itself. Returns the ids of the fact records (new or
    /// pre-existing duplicates).
    pub async fn store_user_message(&self, thread_id: &str, text: &str) -> Vec<String> {
        let mut fact_ids = Vec::new();
        for candidate in self.extractor.extract(text).await {
            if let Some(id) = self.store_fact(thread_id, &candidate).await {
                fact_ids.push(id);
            }
        }

        let embedding = self.embed_or_zero(text).await;
        let message = Document {
            id: Uuid::new_v4().to_string(),
            content: text.to_string(),
            embedding,
            category: CATEGORY_USER_MESSAGE.to_string(),
            summary: truncate_chars(text, WEB_SUMMARY_LEN).to_string(),
            content_hash: Some(content_hash(text)),
            timestamp: now_timestamp(),
            source_url: None,
            title: None,
            topic: None,
            thread_id: Some(thread_id.to_string()),
            record_type: Some(RECORD_TYPE_MEMORY.to_string()),
        };
        if let Err(e) = self.index.upsert(message).await {
            warn!("Failed to store user message: {e}");
        }

        fact_ids
    }

    /// Store a single candidate fact, deduplicated against existing facts in
    /// the same thread.
    ///
    /// An exact content-hash match always returns the existing id without
    /// writing. A near-duplicate above the similarity threshold is also
    /// treated as existing (best-effort). Returns `None` only on persistence
    /// failure.
    pub async fn store_fact(&self, thread_id: &str, fact: &CandidateFact) -> Option<String> {
        let hash = content_hash(&fact.text);

        let exact = SearchRequest::filtered(
            DocumentFilter {
                thread_id: Some(thread_id.to_string()),
                category: Some(CATEGORY_PERSONAL_FACT.to_string()),
                content_hash: Some(hash.clone()),
                ..Default::default()
            },
            1,
        );
        match self.index.search(exact).await {
            Ok(existing) if !existing.is_empty() => {
                debug!("Exact duplicate fact, reusing id: {}", fact.text);
                return Some(existing[0].document.id.clone());
            }
            Ok(_) => {}
            Err(e) => warn!("Duplicate check failed, storing anyway: {e}"),
        }

        let embedding = self.embed_or_zero(&fact.text).await;
        let near = SearchRequest {
            filter: DocumentFilter {
                thread_id: Some(thread_id.to_string()),
                category: Some(CATEGORY_PERSONAL_FACT.to_string()),
                ..Default::default()
            },
            vector: Some(embedding.clone()),
            order_by: None,
            top: 1,
        };
        if let Ok(similar) = self.index.search(near).await {
            if let Some(best) = similar.first() {
                if f64::from(best.score) >= self.config.dedup_threshold {
                    debug!(
                        "Near-duplicate fact (similarity {:.3}), reusing id: {}",
                        best.score, fact.text
                    );
                    return Some(best.document.id.clone());
                }
            }
        }

        if let Some(replaced) = &fact.replaces {
            debug!("New fact supersedes '{replaced}': {}", fact.text);
        }

        let document = Document {
            id: Uuid::new_v4().to_string(),
            content: fact.text.clone(),
            embedding,
            category: CATEGORY_PERSONAL_FACT.to_string(),
            summary: fact.text.clone(),
            content_hash: Some(hash),
            timestamp: now_timestamp(),
            source_url: None,
            title: Some(fact.kind.as_str().to_string()),
            topic: Some(format!("personal_{}", fact.kind.as_str())),
            thread_id: Some(thread_id.to_string()),
            record_type: Some(RECORD_TYPE_MEMORY.to_string()),
        };
        let id = document.id.clone();
        match self.index.upsert(document).await {
            Ok(()) => Some(id),
            Err(e) => {
                warn!("Failed to store fact '{}': {e}", fact.text);
                None
            }
        }
    }

    /// Store scraped web pages as memories for a topic. Pages with too
    /// little content are skipped. Returns the number of pages stored.
    pub async fn store_web_content(
        &self,
        thread_id: &str,
        topic: &str,
        pages: &[WebPage],
    ) -> usize {
        let mut stored = 0;
        for page in pages {
            if page.content.chars().count() < self.min_web_content_len {
                debug!("Skipping thin web page: {}", page.url);
                continue;
            }

            let embedding = self.embed_or_zero(&page.content).await;
            let summary = if page.content.chars().count() > WEB_SUMMARY_LEN {
                format!("{}...", truncate_chars(&page.content, WEB_SUMMARY_LEN))
            } else {
                page.content.clone()
            };
            let document = Document {
                id: Uuid::new_v4().to_string(),
                content: page.content.clone(),
                embedding,
                category: CATEGORY_WEB_CONTENT.to_string(),
                summary,
                content_hash: Some(content_hash(&page.content)),
                timestamp: now_timestamp(),
                source_url: Some(page.url.clone()),
                title: Some(page.title.clone()),
                topic: Some(topic.to_string()),
                thread_id: Some(thread_id.to_string()),
                record_type: Some(RECORD_TYPE_MEMORY.to_string()),
            };
            match self.index.upsert(document).await {
                Ok(()) => stored += 1,
                Err(e) => warn!("Failed to store web content from {}: {e}", page.url),
            }
        }
        stored
    }

    /// Retrieve the memories most relevant to a query.
    ///
    /// Over-fetches, then collapses single-valued personal facts to the most
    /// recent per kind and deduplicates other memories by content prefix,
    /// then returns the top `k` by relevance.
    pub async fn retrieve(&self, thread_id: &str, query: &str, k: usize) -> Vec<ScoredDocument> {
        let vector = self.embed_or_zero(query).await;
        let request = SearchRequest {
            filter: DocumentFilter {
                thread_id: Some(thread_id.to_string()),
                record_type: Some(RECORD_TYPE_MEMORY.to_string()),
                ..Default::default()
            },
            vector: Some(vector),
            order_by: None,
            top: k.saturating_mul(3),
        };
        let candidates = match self.index.search(request).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Memory retrieval failed, returning no memories: {e}");
                return Vec::new();
            }
        };

        let mut seen_prefixes: HashSet<String> = HashSet::new();
        let mut latest_per_kind: HashSet<&'static str> = HashSet::new();
        let mut results: Vec<ScoredDocument> = Vec::new();

        for scored in candidates {
            let doc = &scored.document;
            if doc.category == CATEGORY_PERSONAL_FACT {
                let kind = FactKind::from_str_value(doc.title.as_deref().unwrap_or(""));
                if kind.is_single_valued() {
                    // Candidates are not time-ordered here, so resolve the
                    // authoritative fact per kind explicitly.
                    if !latest_per_kind.insert(kind.as_str()) {
                        continue;
                    }
                    if let Some(current) = self.current_fact(thread_id, kind).await {
                        results.push(ScoredDocument {
                            score: scored.score,
                            document: current,
                        });
                    }
                    continue;
                }
            }
            let prefix = truncate_chars(&doc.content, RETRIEVAL_DEDUP_PREFIX).to_lowercase();
            if seen_prefixes.insert(prefix) {
                results.push(scored);
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        results
    }

    /// The authoritative fact for a single-valued kind: most recent wins.
    pub async fn current_fact(&self, thread_id: &str, kind: FactKind) -> Option<Document> {
        let request = SearchRequest {
            filter: DocumentFilter {
                thread_id: Some(thread_id.to_string()),
                category: Some(CATEGORY_PERSONAL_FACT.to_string()),
                topic: Some(format!("personal_{}", kind.as_str())),
                ..Default::default()
            },
            vector: None,
            order_by: Some(mnema_core::types::OrderBy::TimestampDesc),
            top: 1,
        };
        match self.index.search(request).await {
            Ok(results) => results.into_iter().next().map(|s| s.document),
            Err(e) => {
                warn!("current_fact lookup failed: {e}");
                None
            }
        }
    }

    /// All personal-fact documents for a thread, most recent first.
    pub async fn personal_facts(&self, thread_id: &str) -> Vec<Document> {
        let request = SearchRequest {
            filter: DocumentFilter {
                thread_id: Some(thread_id.to_string()),
                category: Some(CATEGORY_PERSONAL_FACT.to_string()),
                ..Default::default()
            },
            vector: None,
            order_by: Some(mnema_core::types::OrderBy::TimestampDesc),
            top: self.config.load_page_size,
        };
        match self.index.search(request).await {
            Ok(results) => results.into_iter().map(|s| s.document).collect(),
            Err(e) => {
                warn!("personal_facts lookup failed: {e}");
                Vec::new()
            }
        }
    }

    /// What is currently known about the user: name, employer, and the
    /// current fact texts (single-valued kinds collapsed to most recent,
    /// preferences accumulated).
    pub async fn get_user_context(&self, thread_id: &str) -> UserContext {
        let mut context = UserContext::default();
        let mut seen_kinds: HashSet<&'static str> = HashSet::new();

        for doc in self.personal_facts(thread_id).await {
            let kind = FactKind::from_str_value(doc.title.as_deref().unwrap_or(""));
            if kind.is_single_valued() && !seen_kinds.insert(kind.as_str()) {
                continue;
            }
            if let Some(name) = doc.content.strip_prefix("Name:") {
                context.name = Some(name.trim().to_string());
            }
            if let Some(company) = doc.content.strip_prefix("Works at:") {
                context.company = Some(company.trim().to_string());
            }
            context.facts.push(doc.content);
        }
        context
    }
}

/// Char-safe prefix of at most `n` characters.
pub fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
