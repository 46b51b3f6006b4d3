// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document index trait for the vector-searchable persistence backend.

use async_trait::async_trait;

use crate::error::MnemaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Document, ScoredDocument, SearchRequest};

/// Adapter for the vector-searchable document store.
///
/// The engine treats persistence purely as upsert / search / delete over
/// [`Document`] records. Searches combine exact-match field filters with an
/// optional vector query and an optional timestamp ordering; all operations
/// are scoped by the filter's thread id so independent threads never observe
/// each other's records.
#[async_trait]
pub trait DocumentIndex: PluginAdapter {
    /// Inserts the document, replacing any existing document with the same id.
    async fn upsert(&self, document: Document) -> Result<(), MnemaError>;

    /// Runs a filtered, optionally vector-scored search.
    async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredDocument>, MnemaError>;

    /// Deletes the documents with the given ids. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<(), MnemaError>;
}
