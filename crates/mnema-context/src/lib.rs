// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation context for Mnema: topic resolution, the per-thread
//! conversation ledger, query analysis, and prompt composition.

pub mod analyzer;
pub mod classifier;
pub mod composer;
pub mod staleness;
pub mod topic;
pub mod tracker;

pub use analyzer::{is_update_request, ContextAnalyzer, QueryAnalysis};
pub use classifier::{
    Classification, Classifier, ClassifierContext, LlmClassifier, RetryingClassifier,
    RuleClassifier, TEMPORAL_UPDATE_SINCE_LAST,
};
pub use composer::{compose, extract_facts_from_response, format_memories, should_track_response};
pub use tracker::{
    ConversationSummary, ConversationTracker, ConversationTurn, FactsSummary, SharedFact,
    RECORD_TYPE_PREFERENCE, RECORD_TYPE_SHARED_FACT, RECORD_TYPE_TURN,
};
