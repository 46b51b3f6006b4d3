// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term memory for Mnema: personal-fact extraction, content-hash
//! deduplication, and relevance-ranked retrieval over the document index.

pub mod extractor;
pub mod store;
pub mod types;

pub use extractor::{fallback_extract, FactExtractor};
pub use store::{
    truncate_chars, FactStore, CATEGORY_PERSONAL_FACT, CATEGORY_USER_MESSAGE,
    CATEGORY_WEB_CONTENT, RECORD_TYPE_MEMORY,
};
pub use types::{content_hash, CandidateFact, FactKind, UserContext};
