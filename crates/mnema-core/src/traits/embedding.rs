// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::MnemaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter for generating vector embeddings from text.
///
/// Embedding adapters power semantic search and memory retrieval. Callers
/// in the memory pipeline degrade an `Err` to a zero vector of
/// [`EmbeddingAdapter::dimensions`] so that a failed embedding never fails
/// the conversation turn.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Generates embeddings for the given input.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemaError>;

    /// Fixed dimensionality of vectors produced by this adapter.
    fn dimensions(&self) -> usize;
}
