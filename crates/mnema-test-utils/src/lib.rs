// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Mnema integration tests.
//!
//! Provides deterministic mock implementations of the collaborator
//! adapters: LLM provider, embedder, and web search.

pub mod mock_embedder;
pub mod mock_provider;
pub mod mock_web;

pub use mock_embedder::{FailingEmbedder, MockEmbedder, MOCK_DIMENSIONS};
pub use mock_provider::MockProvider;
pub use mock_web::MockWebSearch;
