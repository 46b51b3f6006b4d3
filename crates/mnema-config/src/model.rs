// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Mnema memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Mnema configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MnemaConfig {
    /// Engine identity and behavior settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// LLM provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Document index storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Memory system settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Query analyzer settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Web search settings.
    #[serde(default)]
    pub search: SearchConfig,
}

/// Engine identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the assistant.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "mnema".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// LLM provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key. `None` requires an environment variable at adapter
    /// construction time.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for answer generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for query classification and fact extraction. Cheaper
    /// tier than the generation model.
    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            classifier_model: default_classifier_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_classifier_model() -> String {
    "claude-haiku-4-5-20250901".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Document index storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("mnema").join("mnema.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("mnema.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Memory system configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Cosine similarity above which a candidate fact is treated as a
    /// near-duplicate of an existing one (best-effort secondary check;
    /// exact hash matches are always duplicates).
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,

    /// Number of memories handed to the prompt composer per turn.
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,

    /// Historical-load page size when populating tracker caches.
    #[serde(default = "default_load_page_size")]
    pub load_page_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: default_dedup_threshold(),
            retrieval_k: default_retrieval_k(),
            load_page_size: default_load_page_size(),
        }
    }
}

fn default_dedup_threshold() -> f64 {
    0.85
}

fn default_retrieval_k() -> usize {
    5
}

fn default_load_page_size() -> usize {
    1000
}

/// Query analyzer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Total attempts for the LLM classification call before falling back
    /// to the rule-based classifier.
    #[serde(default = "default_classify_attempts")]
    pub classify_attempts: u32,

    /// Base backoff delay between classification attempts, in milliseconds.
    /// Doubles per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff cap in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            classify_attempts: default_classify_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

fn default_classify_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_cap_ms() -> u64 {
    4000
}

/// Web search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Maximum scraped results requested per search.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Minimum scraped content length worth storing, in characters.
    #[serde(default = "default_min_content_len")]
    pub min_content_len: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_content_len: default_min_content_len(),
        }
    }
}

fn default_max_results() -> usize {
    3
}

fn default_min_content_len() -> usize {
    50
}
