// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic mock embedding adapter.
//!
//! Embeds text by hashing it, so identical texts always map to identical
//! vectors and distinct texts are very unlikely to collide. This gives
//! dedup and retrieval tests stable similarity behavior without a model.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use mnema_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use mnema_core::{EmbeddingAdapter, MnemaError, PluginAdapter};

/// Dimensionality of mock embeddings.
pub const MOCK_DIMENSIONS: usize = 32;

/// A hash-based embedding adapter for tests.
pub struct MockEmbedder;

impl MockEmbedder {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic unit-length vector for a text.
    pub fn embed_text(text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut vector: Vec<f32> = digest
            .iter()
            .take(MOCK_DIMENSIONS)
            // Map each byte to [-1, 1].
            .map(|b| (f32::from(*b) / 255.0) * 2.0 - 1.0)
            .collect();
        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }
        vector
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MnemaError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemaError> {
        let embeddings = input
            .texts
            .iter()
            .map(|text| Self::embed_text(text))
            .collect();
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: MOCK_DIMENSIONS,
        })
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }
}

/// An embedding adapter that always fails. For degradation-path tests.
pub struct FailingEmbedder;

#[async_trait]
impl PluginAdapter for FailingEmbedder {
    fn name(&self) -> &str {
        "failing-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemaError> {
        Ok(HealthStatus::Unhealthy("always fails".to_string()))
    }

    async fn shutdown(&self) -> Result<(), MnemaError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for FailingEmbedder {
    async fn embed(&self, _input: EmbeddingInput) -> Result<EmbeddingOutput, MnemaError> {
        Err(MnemaError::Embedding {
            message: "mock embedding failure".to_string(),
            source: None,
        })
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }
}
