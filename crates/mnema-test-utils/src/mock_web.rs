// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock web search adapter returning pre-configured pages.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use mnema_core::types::{AdapterType, HealthStatus, WebPage};
use mnema_core::{MnemaError, PluginAdapter, WebSearchAdapter};

/// A mock web search that pops pre-configured result sets from a queue.
///
/// Each `search_and_scrape` call consumes one queued result set. An empty
/// queue yields no results. Queried terms are recorded for assertions.
pub struct MockWebSearch {
    results: Arc<Mutex<VecDeque<Vec<WebPage>>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockWebSearch {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(VecDeque::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a result set for the next search call.
    pub async fn add_results(&self, pages: Vec<WebPage>) {
        self.results.lock().await.push_back(pages);
    }

    /// All queries received so far, in order.
    pub async fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }
}

impl Default for MockWebSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockWebSearch {
    fn name(&self) -> &str {
        "mock-web-search"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::WebSearch
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MnemaError> {
        Ok(())
    }
}

#[async_trait]
impl WebSearchAdapter for MockWebSearch {
    async fn search_and_scrape(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebPage>, MnemaError> {
        self.queries.lock().await.push(query.to_string());
        let mut pages = self
            .results
            .lock()
            .await
            .pop_front()
            .unwrap_or_default();
        pages.truncate(max_results);
        Ok(pages)
    }
}
