// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Mnema memory engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and a [`SqliteIndex`] implementing
//! the document index contract: filtered lookups, vector-scored retrieval,
//! and upsert/delete.

pub mod database;
pub mod index;
pub mod migrations;

pub use database::Database;
pub use index::SqliteIndex;
