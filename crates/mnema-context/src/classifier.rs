// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query classification strategies.
//!
//! `LlmClassifier` asks the classifier model for a structured JSON decision;
//! `RuleClassifier` is the deterministic keyword fallback. `RetryingClassifier`
//! composes them: bounded retries with exponential backoff, then fallback.
//! Classification failure is never fatal for a turn.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mnema_config::AnalyzerConfig;
use mnema_core::types::{ProviderMessage, ProviderRequest};
use mnema_core::{MnemaError, ProviderAdapter};

use crate::topic;

/// Temporal requirement value for explicit update requests.
pub const TEMPORAL_UPDATE_SINCE_LAST: &str = "update_since_last";

/// Everything a classifier may consider about the query.
#[derive(Debug, Clone)]
pub struct ClassifierContext {
    pub query: String,
    pub topic: String,
    pub user_name: Option<String>,
    pub user_company: Option<String>,
    /// Whether the query contains an "asking for update" keyword.
    pub is_update_request: bool,
    /// Timestamp of the last discussion of this topic, if any.
    pub last_discussed: Option<String>,
}

/// A classification decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub enhanced_query: String,
    /// "personal_fact" | "news" | "weather" | "stock" | "general".
    pub query_type: String,
    /// "none" | "recent" | "immediate" | "update_since_last".
    #[serde(default = "default_temporal")]
    pub temporal_requirement: String,
    #[serde(default)]
    pub search_constraints: Vec<String>,
    #[serde(default)]
    pub information_gaps: Vec<String>,
    #[serde(default)]
    pub user_intent: String,
    #[serde(default)]
    pub requires_search: bool,
    #[serde(default)]
    pub prompt_instructions: String,
}

fn default_temporal() -> String {
    "none".to_string()
}

/// Strategy interface over the classification decision.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, context: &ClassifierContext) -> Result<Classification, MnemaError>;
}

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You classify a user's query for a memory-augmented assistant. Respond with a single JSON object and nothing else:

{
  "enhanced_query": "the query rewritten with known user context resolved (e.g. 'our CEO' becomes '<company> CEO')",
  "query_type": "personal_fact | news | weather | stock | general",
  "temporal_requirement": "none | recent | immediate | update_since_last",
  "search_constraints": ["e.g. after:2026-08-01"],
  "information_gaps": ["what stored memory cannot answer"],
  "user_intent": "one sentence",
  "requires_search": true,
  "prompt_instructions": "one or two sentences of guidance for the answering model"
}

Use "update_since_last" when the user explicitly asks what is new since a prior discussion. Personal-fact queries about the user's own attributes never require search."#;

/// Model-backed classification with a constrained JSON contract.
pub struct LlmClassifier {
    provider: Arc<dyn ProviderAdapter>,
    model: String,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn ProviderAdapter>, model: String) -> Self {
        Self { provider, model }
    }

    fn build_user_prompt(context: &ClassifierContext) -> String {
        let mut prompt = format!("Query: {}\nTopic: {}\n", context.query, context.topic);
        if let Some(name) = &context.user_name {
            prompt.push_str(&format!("User name: {name}\n"));
        }
        if let Some(company) = &context.user_company {
            prompt.push_str(&format!("User company: {company}\n"));
        }
        prompt.push_str(&format!(
            "Asking for updates: {}\n",
            if context.is_update_request { "yes" } else { "no" }
        ));
        if let Some(last) = &context.last_discussed {
            prompt.push_str(&format!("Topic last discussed: {last}\n"));
        }
        prompt
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, context: &ClassifierContext) -> Result<Classification, MnemaError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            system_prompt: Some(CLASSIFY_SYSTEM_PROMPT.to_string()),
            messages: vec![ProviderMessage {
                role: "user".to_string(),
                content: Self::build_user_prompt(context),
            }],
            max_tokens: 1024,
        };
        let response = self.provider.complete(request).await?;

        // Malformed JSON is equivalent to a call failure.
        parse_classification(&response.content).ok_or_else(|| MnemaError::Provider {
            message: "classification response was not valid JSON".to_string(),
            source: None,
        })
    }
}

/// Outermost JSON object in a model response, including any nesting.
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Extract and parse the JSON object from a classification response.
fn parse_classification(response: &str) -> Option<Classification> {
    let json = JSON_OBJECT.find(response)?.as_str();
    match serde_json::from_str(json) {
        Ok(classification) => Some(classification),
        Err(e) => {
            debug!("Classification JSON parse error: {e}");
            None
        }
    }
}

/// Deterministic keyword-based classification. Never fails.
pub struct RuleClassifier;

#[async_trait]
impl Classifier for RuleClassifier {
    async fn classify(&self, context: &ClassifierContext) -> Result<Classification, MnemaError> {
        Ok(rule_classify(context))
    }
}

fn rule_classify(context: &ClassifierContext) -> Classification {
    let lower = context.query.to_lowercase();
    let is_personal =
        context.topic.starts_with("personal_") || topic::is_personal_query(&context.query);

    let mut enhanced_query = context.query.clone();
    let query_type;
    let mut requires_search;
    let mut prompt_instructions;

    if is_personal {
        query_type = "personal_fact".to_string();
        requires_search = false;
        let category = context
            .topic
            .strip_prefix("personal_")
            .unwrap_or("fact")
            .to_string();
        prompt_instructions = format!("State the user's {category} if known");
    } else if lower.contains("ceo") || lower.contains("resignation") || lower.contains("news") {
        query_type = "news".to_string();
        requires_search = true;
        prompt_instructions = "Report the relevant news accurately".to_string();
        if let Some(company) = &context.user_company {
            enhanced_query = context.query.replace("our", company).replace("Our", company);
        }
    } else if lower.contains("weather") {
        query_type = "weather".to_string();
        requires_search = true;
        prompt_instructions = "Report current weather conditions".to_string();
    } else if lower.contains("stock") {
        query_type = "stock".to_string();
        requires_search = true;
        prompt_instructions = "Report the current stock information".to_string();
    } else {
        query_type = "general".to_string();
        requires_search = true;
        prompt_instructions = "Answer the question using available information".to_string();
    }

    let mut temporal_requirement = "none".to_string();
    let mut search_constraints = Vec::new();
    if context.is_update_request {
        temporal_requirement = TEMPORAL_UPDATE_SINCE_LAST.to_string();
        if let Some(last) = &context.last_discussed {
            let date = last.split('T').next().unwrap_or(last);
            search_constraints.push(format!("after:{date}"));
        }
        if !prompt_instructions.is_empty() {
            prompt_instructions.push_str(". ");
        }
        prompt_instructions
            .push_str("Only provide information newer than the last discussion");
    }
    if is_personal && context.is_update_request {
        requires_search = false;
    }

    Classification {
        enhanced_query,
        user_intent: format!("User wants information about {}", context.topic),
        query_type,
        temporal_requirement,
        search_constraints,
        information_gaps: Vec::new(),
        requires_search,
        prompt_instructions,
    }
}

/// Retries the primary classifier with exponential backoff, then falls back
/// to the deterministic rules.
pub struct RetryingClassifier {
    primary: Arc<dyn Classifier>,
    fallback: Arc<dyn Classifier>,
    attempts: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl RetryingClassifier {
    pub fn new(primary: Arc<dyn Classifier>, config: &AnalyzerConfig) -> Self {
        Self {
            primary,
            fallback: Arc::new(RuleClassifier),
            attempts: config.classify_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_cap: Duration::from_millis(config.backoff_cap_ms),
        }
    }
}

#[async_trait]
impl Classifier for RetryingClassifier {
    async fn classify(&self, context: &ClassifierContext) -> Result<Classification, MnemaError> {
        let mut backoff = self.backoff_base;
        for attempt in 1..=self.attempts {
            match self.primary.classify(context).await {
                Ok(classification) => return Ok(classification),
                Err(e) => {
                    warn!("Classification attempt {attempt}/{} failed: {e}", self.attempts);
                    if attempt < self.attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(self.backoff_cap);
                    }
                }
            }
        }
        debug!("Falling back to rule-based classification");
        self.fallback.classify(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnema_test_utils::MockProvider;

    fn context(query: &str, topic: &str) -> ClassifierContext {
        ClassifierContext {
            query: query.to_string(),
            topic: topic.to_string(),
            user_name: None,
            user_company: None,
            is_update_request: false,
            last_discussed: None,
        }
    }

    fn fast_config() -> AnalyzerConfig {
        AnalyzerConfig {
            classify_attempts: 3,
            backoff_base_ms: 1,
            backoff_cap_ms: 4,
        }
    }

    #[test]
    fn parse_classification_with_prose() {
        let response = r#"Sure, here is the classification:
{"enhanced_query": "Renault CEO resignation updates", "query_type": "news", "temporal_requirement": "update_since_last", "search_constraints": [], "information_gaps": [], "user_intent": "wants news", "requires_search": true, "prompt_instructions": "be brief"}"#;
        let c = parse_classification(response).unwrap();
        assert_eq!(c.query_type, "news");
        assert_eq!(c.temporal_requirement, TEMPORAL_UPDATE_SINCE_LAST);
        assert!(c.requires_search);
    }

    #[test]
    fn parse_classification_rejects_non_json() {
        assert!(parse_classification("no json here").is_none());
        assert!(parse_classification("{broken").is_none());
    }

    #[tokio::test]
    async fn llm_classifier_treats_malformed_json_as_failure() {
        let provider = Arc::new(MockProvider::with_responses(vec![
            "I cannot classify this.".to_string(),
        ]));
        let classifier = LlmClassifier::new(provider, "model".to_string());
        assert!(classifier.classify(&context("q", "general")).await.is_err());
    }

    #[tokio::test]
    async fn rule_classifier_news_with_company_enhancement() {
        let mut ctx = context("any updates on our CEO's resignation?", "CEO resignation");
        ctx.user_company = Some("Renault".to_string());
        ctx.is_update_request = true;
        ctx.last_discussed = Some("2026-08-20T10:00:00.000Z".to_string());

        let c = RuleClassifier.classify(&ctx).await.unwrap();
        assert_eq!(c.query_type, "news");
        assert!(c.enhanced_query.contains("Renault"));
        assert!(c.requires_search);
        assert_eq!(c.temporal_requirement, TEMPORAL_UPDATE_SINCE_LAST);
        assert_eq!(c.search_constraints, vec!["after:2026-08-20".to_string()]);
    }

    #[tokio::test]
    async fn rule_classifier_personal_never_searches() {
        let c = RuleClassifier
            .classify(&context("what is my name?", "personal_name"))
            .await
            .unwrap();
        assert_eq!(c.query_type, "personal_fact");
        assert!(!c.requires_search);
        assert!(c.prompt_instructions.contains("name"));
    }

    #[tokio::test]
    async fn rule_classifier_weather_and_stock_and_general() {
        let w = RuleClassifier
            .classify(&context("weather in Paris", "weather_paris"))
            .await
            .unwrap();
        assert_eq!(w.query_type, "weather");

        let s = RuleClassifier
            .classify(&context("Tesla stock today", "stock_price"))
            .await
            .unwrap();
        assert_eq!(s.query_type, "stock");

        let g = RuleClassifier
            .classify(&context("history of rome", "history of rome"))
            .await
            .unwrap();
        assert_eq!(g.query_type, "general");
        assert!(g.requires_search);
    }

    #[tokio::test]
    async fn retrying_classifier_falls_back_after_exhaustion() {
        let provider = Arc::new(MockProvider::new());
        for _ in 0..3 {
            provider.add_failure("unavailable".to_string()).await;
        }
        let primary = Arc::new(LlmClassifier::new(
            Arc::clone(&provider) as Arc<dyn ProviderAdapter>,
            "model".to_string(),
        ));
        let classifier = RetryingClassifier::new(primary, &fast_config());

        let c = classifier
            .classify(&context("weather in Paris", "weather_paris"))
            .await
            .unwrap();
        // Deterministic fallback answered.
        assert_eq!(c.query_type, "weather");
        assert_eq!(provider.recorded_requests().await.len(), 3);
    }

    #[tokio::test]
    async fn retrying_classifier_recovers_on_second_attempt() {
        let provider = Arc::new(MockProvider::new());
        provider.add_failure("transient".to_string()).await;
        provider
            .add_response(
                r#"{"enhanced_query": "q", "query_type": "news", "temporal_requirement": "none", "requires_search": true}"#
                    .to_string(),
            )
            .await;
        let primary = Arc::new(LlmClassifier::new(
            Arc::clone(&provider) as Arc<dyn ProviderAdapter>,
            "model".to_string(),
        ));
        let classifier = RetryingClassifier::new(primary, &fast_config());

        let c = classifier.classify(&context("q", "news")).await.unwrap();
        assert_eq!(c.query_type, "news");
        assert_eq!(provider.recorded_requests().await.len(), 2);
    }
}
