// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for external collaborators.

pub mod adapter;
pub mod embedding;
pub mod index;
pub mod provider;
pub mod web;

pub use adapter::PluginAdapter;
pub use embedding::EmbeddingAdapter;
pub use index::DocumentIndex;
pub use provider::ProviderAdapter;
pub use web::WebSearchAdapter;
