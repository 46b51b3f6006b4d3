// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Context Analyzer: per-query decision engine.
//!
//! Produces one [`QueryAnalysis`] per incoming query. Personal-fact queries
//! short-circuit the full pipeline and are answered from stored facts only.
//! Everything else goes through shared-fact exclusion, staleness flagging,
//! and classification, with the deterministic personal detector overriding
//! the probabilistic classifier where they disagree.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use mnema_memory::UserContext;

use crate::classifier::{
    Classifier, ClassifierContext, TEMPORAL_UPDATE_SINCE_LAST,
};
use crate::staleness;
use crate::topic;
use crate::tracker::ConversationTracker;

/// Keywords marking an explicit request for information newer than the last
/// discussion.
const UPDATE_KEYWORDS: &[&str] = &[
    "new",
    "update",
    "latest",
    "recent",
    "any more",
    "anything new",
    "as of now",
    "since",
];

/// The analyzer's decision for one query. Transient, not persisted.
#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    pub original_query: String,
    pub enhanced_query: String,
    pub query_type: String,
    /// "none" | "recent" | "immediate" | "update_since_last".
    pub temporal_requirement: String,
    pub requires_search: bool,
    /// Texts of already-shared facts the answer must not repeat.
    pub exclude_facts: Vec<String>,
    pub search_constraints: Vec<String>,
    pub user_intent: String,
    pub prompt_instructions: String,
    pub is_personal_query: bool,
    pub topic: String,
    /// Last discussion timestamp for the topic, when known.
    pub last_discussed: Option<String>,
    /// Texts of shared facts older than the topic's freshness threshold.
    /// Informational; does not itself force a search.
    pub stale_facts: Vec<String>,
}

/// Whether the query explicitly asks for an update.
pub fn is_update_request(query: &str) -> bool {
    let lower = query.to_lowercase();
    UPDATE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Decides, per query, what the composer and the turn pipeline should do.
pub struct ContextAnalyzer {
    classifier: Arc<dyn Classifier>,
}

impl ContextAnalyzer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub async fn analyze(
        &self,
        query: &str,
        topic_key: &str,
        tracker: &ConversationTracker,
        user: &UserContext,
    ) -> QueryAnalysis {
        let personal_category = topic::personal_fact_category(query);
        let is_personal = personal_category.is_some() || topic::is_personal_query(query);
        let asking_update = is_update_request(query);

        // Personal facts are answered from the Fact Store only: no web
        // search, no exclusion, no classifier involvement.
        if is_personal && !asking_update {
            let category = personal_category.unwrap_or("fact");
            debug!("Personal-fact short circuit for category '{category}'");
            return QueryAnalysis {
                original_query: query.to_string(),
                enhanced_query: query.to_string(),
                query_type: "personal_fact".to_string(),
                temporal_requirement: "none".to_string(),
                requires_search: false,
                exclude_facts: Vec::new(),
                search_constraints: Vec::new(),
                user_intent: format!("User wants to know their {category}"),
                prompt_instructions: format!(
                    "Simply state the user's {category} if known"
                ),
                is_personal_query: true,
                topic: topic_key.to_string(),
                last_discussed: None,
                stale_facts: Vec::new(),
            };
        }

        let last_discussed = tracker.get_last_discussion_time(topic_key).await;
        let shared_facts = tracker.get_shared_facts(topic_key, None).await;

        // Update requests exclude only facts shared strictly before the
        // last discussion; other non-personal queries exclude everything
        // already surfaced.
        let exclude_facts: Vec<String> = if asking_update {
            match &last_discussed {
                Some(last) => shared_facts
                    .iter()
                    .filter(|f| f.shared_at.as_str() < last.as_str())
                    .map(|f| f.text.clone())
                    .collect(),
                // No recorded discussion time to cut against: suppress
                // everything already surfaced rather than repeat it.
                None => shared_facts.iter().map(|f| f.text.clone()).collect(),
            }
        } else if !is_personal {
            shared_facts.iter().map(|f| f.text.clone()).collect()
        } else {
            Vec::new()
        };

        let now = Utc::now();
        let stale_facts: Vec<String> = shared_facts
            .iter()
            .filter(|f| staleness::is_stale(topic_key, &f.shared_at, now))
            .map(|f| f.text.clone())
            .collect();

        let context = ClassifierContext {
            query: query.to_string(),
            topic: topic_key.to_string(),
            user_name: user.name.clone(),
            user_company: user.company.clone(),
            is_update_request: asking_update,
            last_discussed: last_discussed.clone(),
        };
        // The retrying classifier already degrades to rules internally; a
        // residual error still must not fail the turn.
        let classification = match self.classifier.classify(&context).await {
            Ok(classification) => classification,
            Err(e) => {
                debug!("Classifier failed outright, using neutral decision: {e}");
                crate::classifier::Classification {
                    enhanced_query: query.to_string(),
                    query_type: "general".to_string(),
                    temporal_requirement: if asking_update {
                        TEMPORAL_UPDATE_SINCE_LAST.to_string()
                    } else {
                        "none".to_string()
                    },
                    search_constraints: Vec::new(),
                    information_gaps: Vec::new(),
                    user_intent: String::new(),
                    requires_search: !is_personal,
                    prompt_instructions: String::new(),
                }
            }
        };

        let mut analysis = QueryAnalysis {
            original_query: query.to_string(),
            enhanced_query: classification.enhanced_query,
            query_type: classification.query_type,
            temporal_requirement: classification.temporal_requirement,
            requires_search: classification.requires_search,
            exclude_facts,
            search_constraints: classification.search_constraints,
            user_intent: classification.user_intent,
            prompt_instructions: classification.prompt_instructions,
            is_personal_query: is_personal,
            topic: topic_key.to_string(),
            last_discussed,
            stale_facts,
        };

        // The deterministic detector always overrides the classifier on the
        // personal flag.
        if is_personal {
            analysis.is_personal_query = true;
            analysis.query_type = "personal_fact".to_string();
            if !asking_update {
                analysis.requires_search = false;
            }
        }

        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LlmClassifier, RetryingClassifier, RuleClassifier};
    use crate::tracker::ConversationTracker;
    use mnema_config::{AnalyzerConfig, StorageConfig};
    use mnema_core::DocumentIndex;
    use mnema_core::ProviderAdapter;
    use mnema_storage::SqliteIndex;
    use mnema_test_utils::MockProvider;
    use std::time::Duration;

    async fn tracker() -> ConversationTracker {
        let index = SqliteIndex::new(StorageConfig::default());
        index.initialize_in_memory().await.unwrap();
        let index: Arc<dyn DocumentIndex> = Arc::new(index);
        ConversationTracker::load(index, "t1", 1000).await
    }

    fn rule_analyzer() -> ContextAnalyzer {
        ContextAnalyzer::new(Arc::new(RuleClassifier))
    }

    #[tokio::test]
    async fn personal_query_short_circuits() {
        let tracker = tracker().await;
        let analysis = rule_analyzer()
            .analyze("What is my name?", "personal_name", &tracker, &UserContext::default())
            .await;

        assert!(analysis.is_personal_query);
        assert_eq!(analysis.query_type, "personal_fact");
        assert!(!analysis.requires_search);
        assert!(analysis.exclude_facts.is_empty());
        assert!(analysis.prompt_instructions.contains("name"));
    }

    #[tokio::test]
    async fn personal_override_beats_classifier_output() {
        // Classifier claims a search is needed; the detector must win.
        let provider: Arc<dyn ProviderAdapter> = Arc::new(MockProvider::with_responses(vec![
            r#"{"enhanced_query": "q", "query_type": "general", "temporal_requirement": "none", "requires_search": true}"#
                .to_string(),
        ]));
        let analyzer = ContextAnalyzer::new(Arc::new(LlmClassifier::new(
            provider,
            "model".to_string(),
        )));
        let tracker = tracker().await;

        // Personal phrasing that also contains an update keyword would not
        // short-circuit, so force the non-update personal path.
        let analysis = analyzer
            .analyze("where do I work?", "personal_work", &tracker, &UserContext::default())
            .await;
        assert_eq!(analysis.query_type, "personal_fact");
        assert!(!analysis.requires_search);
    }

    #[tokio::test]
    async fn non_personal_excludes_all_shared_facts() {
        let tracker = tracker().await;
        tracker
            .add_shared_fact("stock_price", "Stock closed at 42", "conversation", 0.8)
            .await
            .unwrap();

        let analysis = rule_analyzer()
            .analyze("how is the stock doing", "stock_price", &tracker, &UserContext::default())
            .await;
        assert_eq!(analysis.exclude_facts, vec!["Stock closed at 42".to_string()]);
    }

    #[tokio::test]
    async fn update_request_excludes_only_pre_cutoff_facts() {
        let tracker = tracker().await;
        tracker
            .add_shared_fact("CEO resignation", "The CEO resigned Monday", "conversation", 0.8)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker
            .add_conversation_turn("CEO resignation", "q", "r", &[], &[])
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker
            .add_shared_fact("CEO resignation", "A successor was named", "conversation", 0.8)
            .await
            .unwrap();

        let analysis = rule_analyzer()
            .analyze(
                "any new updates on the CEO resignation?",
                "CEO resignation",
                &tracker,
                &UserContext::default(),
            )
            .await;

        assert_eq!(analysis.temporal_requirement, TEMPORAL_UPDATE_SINCE_LAST);
        // Only the fact shared before the last discussion is excluded.
        assert_eq!(
            analysis.exclude_facts,
            vec!["The CEO resigned Monday".to_string()]
        );
    }

    #[tokio::test]
    async fn update_request_without_discussion_time_excludes_all_shared_facts() {
        // A fact was shared but no conversation turn was ever recorded, so
        // a tracker loaded cold has no cutoff to filter against.
        let index = SqliteIndex::new(StorageConfig::default());
        index.initialize_in_memory().await.unwrap();
        let index: Arc<dyn DocumentIndex> = Arc::new(index);
        let seeder = ConversationTracker::load(Arc::clone(&index), "t1", 1000).await;
        seeder
            .add_shared_fact("CEO resignation", "The CEO resigned Monday", "conversation", 0.8)
            .await
            .unwrap();
        let tracker = ConversationTracker::load(index, "t1", 1000).await;

        let analysis = rule_analyzer()
            .analyze(
                "any new updates on the CEO resignation?",
                "CEO resignation",
                &tracker,
                &UserContext::default(),
            )
            .await;

        assert!(analysis.last_discussed.is_none());
        assert_eq!(
            analysis.exclude_facts,
            vec!["The CEO resigned Monday".to_string()]
        );
    }

    #[tokio::test]
    async fn update_keyword_detection() {
        assert!(is_update_request("any new updates?"));
        assert!(is_update_request("what's the latest?"));
        assert!(is_update_request("anything since yesterday"));
        assert!(!is_update_request("what is the weather in Paris?"));
    }

    #[tokio::test]
    async fn classifier_exhaustion_still_produces_analysis() {
        let provider = Arc::new(MockProvider::new());
        for _ in 0..3 {
            provider.add_failure("down".to_string()).await;
        }
        let primary = Arc::new(LlmClassifier::new(
            Arc::clone(&provider) as Arc<dyn ProviderAdapter>,
            "model".to_string(),
        ));
        let config = AnalyzerConfig {
            classify_attempts: 3,
            backoff_base_ms: 1,
            backoff_cap_ms: 4,
        };
        let analyzer =
            ContextAnalyzer::new(Arc::new(RetryingClassifier::new(primary, &config)));
        let tracker = tracker().await;

        let analysis = analyzer
            .analyze("weather in Paris", "weather_paris", &tracker, &UserContext::default())
            .await;
        assert_eq!(analysis.query_type, "weather");
        assert!(analysis.requires_search);
    }

    #[tokio::test]
    async fn enhanced_query_carries_company() {
        let tracker = tracker().await;
        let user = UserContext {
            name: Some("Jack".to_string()),
            company: Some("Renault".to_string()),
            facts: vec!["Works at: Renault".to_string()],
        };

        let analysis = rule_analyzer()
            .analyze(
                "any updates on our CEO's resignation?",
                "CEO resignation",
                &tracker,
                &user,
            )
            .await;
        assert!(analysis.enhanced_query.contains("Renault"));
    }
}
