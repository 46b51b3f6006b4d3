// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across adapter traits and the Mnema workspace.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Embedding,
    WebSearch,
}

// --- Provider types ---

/// A single message in an LLM conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// Message role: "user" or "assistant".
    pub role: String,
    /// Plain-text message content.
    pub content: String,
}

/// A completion request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Model identifier.
    pub model: String,
    /// System prompt, if any.
    pub system_prompt: Option<String>,
    /// Conversation messages, oldest first.
    pub messages: Vec<ProviderMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// Token usage reported by a provider response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A full (non-streaming) response from an LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Provider-assigned response id.
    pub id: String,
    /// Generated text.
    pub content: String,
    /// Model that produced the response.
    pub model: String,
    /// Why generation stopped, if reported.
    pub stop_reason: Option<String>,
    /// Token accounting for the call.
    pub usage: TokenUsage,
}

// --- Embedding types ---

/// Input for an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    /// Texts to embed, one vector returned per text.
    pub texts: Vec<String>,
}

/// Output from an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// One embedding per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    /// Dimensionality of every returned vector.
    pub dimensions: usize,
}

// --- Document index types ---

/// A document stored in the vector-searchable index.
///
/// This is the narrow shape the engine shares with its persistence backend:
/// memory records, shared facts, conversation turns, and user preferences are
/// all documents distinguished by `record_type` and `category`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document id.
    pub id: String,
    /// Primary text content.
    pub content: String,
    /// Embedding vector for semantic search. Empty when the record is not
    /// vector-searchable (turns, preferences).
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Memory category: "personal_fact", "user_message", "web_content", ...
    pub category: String,
    /// Short human-readable summary of the content.
    pub summary: String,
    /// Stable hash of the normalized content, for exact-duplicate checks.
    pub content_hash: Option<String>,
    /// RFC 3339 UTC timestamp (fixed width, lexicographically ordered).
    pub timestamp: String,
    /// Source URL for web-derived content.
    pub source_url: Option<String>,
    /// Title (web page title, or fact type for personal facts).
    pub title: Option<String>,
    /// Topic key this document belongs to.
    pub topic: Option<String>,
    /// Conversation thread that owns this document.
    pub thread_id: Option<String>,
    /// Record type: "memory", "shared_fact", "conversation_turn", "user_preference".
    pub record_type: Option<String>,
}

/// A document with a retrieval relevance score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    /// Cosine similarity against the query vector, or 0.0 for filter-only queries.
    pub score: f32,
}

/// Exact-match filter over document fields. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub thread_id: Option<String>,
    pub record_type: Option<String>,
    pub topic: Option<String>,
    pub category: Option<String>,
    pub content_hash: Option<String>,
    /// Only documents with `timestamp` strictly greater than this value.
    pub timestamp_after: Option<String>,
}

/// Result ordering for index searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// Most recent first.
    TimestampDesc,
    /// Oldest first.
    TimestampAsc,
}

/// A search request against the document index.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Field filter, applied before scoring.
    pub filter: DocumentFilter,
    /// Optional query vector; when set, results are cosine-scored.
    pub vector: Option<Vec<f32>>,
    /// Optional ordering; when `None` and a vector is set, results are
    /// ordered by descending score.
    pub order_by: Option<OrderBy>,
    /// Maximum number of results.
    pub top: usize,
}

impl SearchRequest {
    /// A filter-only request with the given result cap.
    pub fn filtered(filter: DocumentFilter, top: usize) -> Self {
        Self {
            filter,
            vector: None,
            order_by: None,
            top,
        }
    }
}

// --- Web search types ---

/// A scraped web page returned by the search collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPage {
    pub url: String,
    pub title: String,
    pub content: String,
}

// --- Timestamp helpers ---

/// Format a UTC instant as the fixed-width RFC 3339 string used everywhere in
/// the index. Millisecond precision and a `Z` suffix keep lexicographic order
/// identical to chronological order.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current instant, formatted via [`format_timestamp`].
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a stored timestamp back into a UTC instant. Returns `None` for
/// malformed input rather than failing the read path.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

// --- Vector helpers ---

/// Convert an f32 vector to bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a stored BLOB back to an f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("chunk is 4 bytes")))
        .collect()
}

/// Cosine similarity between two vectors of equal length.
///
/// For L2-normalized vectors this is the dot product; un-normalized vectors
/// are divided by their magnitudes.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
