// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Mnema context/memory engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Mnema workspace. External collaborators
//! (LLM provider, embedding function, document index, web search) are
//! expressed as adapter traits defined here and injected by the caller.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MnemaError;
pub use types::{AdapterType, HealthStatus};

// Re-export all adapter traits at crate root.
pub use traits::{
    DocumentIndex, EmbeddingAdapter, PluginAdapter, ProviderAdapter, WebSearchAdapter,
};
