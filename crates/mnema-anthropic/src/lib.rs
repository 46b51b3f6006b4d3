// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for Mnema.
//!
//! Implements the [`mnema_core::ProviderAdapter`] trait over the Anthropic
//! Messages API (non-streaming), with transient error retry.

pub mod client;
pub mod provider;
pub mod types;

pub use client::AnthropicClient;
pub use provider::AnthropicProvider;
