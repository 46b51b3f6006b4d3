// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Mnema turn engine.
//!
//! Exposes [`TurnEngine::handle_turn`], the single library entry point that
//! takes a thread id and user text and returns the assistant's answer,
//! sequencing topic resolution, context analysis, optional web search,
//! prompt composition, generation, and memory writes.

pub mod engine;

pub use engine::TurnEngine;
