// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types for personal-fact memory.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The attribute of the user a personal fact describes.
///
/// `Name` and `Work` are single-valued: the most recent fact of the kind is
/// authoritative and older ones are kept for audit only. `Preference`
/// accumulates multiple current values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    Name,
    Work,
    Preference,
    Location,
    Relationship,
    Other,
}

impl FactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactKind::Name => "name",
            FactKind::Work => "work",
            FactKind::Preference => "preference",
            FactKind::Location => "location",
            FactKind::Relationship => "relationship",
            FactKind::Other => "other",
        }
    }

    /// Parse a stored string value, mapping unknown values to `Other`.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "name" => FactKind::Name,
            "work" => FactKind::Work,
            "preference" => FactKind::Preference,
            "location" => FactKind::Location,
            "relationship" => FactKind::Relationship,
            _ => FactKind::Other,
        }
    }

    /// All kinds in the fixed facts-block ordering.
    pub fn ordered() -> [FactKind; 6] {
        [
            FactKind::Name,
            FactKind::Work,
            FactKind::Preference,
            FactKind::Location,
            FactKind::Relationship,
            FactKind::Other,
        ]
    }

    /// Whether only the most recent fact of this kind is current.
    pub fn is_single_valued(&self) -> bool {
        !matches!(self, FactKind::Preference)
    }
}

/// A fact candidate produced by extraction, before dedup and storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFact {
    pub kind: FactKind,
    /// Normalized statement, e.g. `"Works at: Renault"`.
    pub text: String,
    /// Extraction confidence in [0, 1].
    pub importance: f32,
    /// Free-text description of an older fact this one supersedes, when the
    /// extractor recognized an explicit replacement ("my favorite color is
    /// now blue").
    pub replaces: Option<String>,
}

/// Summary of what is currently known about the user, for query enhancement.
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    /// Extracted from the most recent `Name` fact, without the label prefix.
    pub name: Option<String>,
    /// Extracted from the most recent `Work` fact, without the label prefix.
    pub company: Option<String>,
    /// Current personal-fact texts, most recent first.
    pub facts: Vec<String>,
}

/// Stable hash of normalized fact text, used for exact-duplicate checks.
///
/// Normalization is lowercase plus trim, so incidental casing and whitespace
/// differences collapse to the same hash.
pub fn content_hash(text: &str) -> String {
    let normalized = text.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{digest:x}")
}
