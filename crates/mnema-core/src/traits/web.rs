// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web search/scrape collaborator trait.

use async_trait::async_trait;

use crate::error::MnemaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::WebPage;

/// Adapter for the external web search and scrape collaborator.
///
/// Called only when query analysis decides external information is required.
/// A failed search is treated by callers as "no web results", never as a
/// fatal error for the turn.
#[async_trait]
pub trait WebSearchAdapter: PluginAdapter {
    /// Searches the web for `query` and returns up to `max_results` scraped pages.
    async fn search_and_scrape(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebPage>, MnemaError>;
}
