// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths and sane threshold ranges.

use mnema_core::MnemaError;

use crate::model::MnemaConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects all violations rather than failing fast, so the operator sees
/// every problem in one pass.
pub fn validate_config(config: &MnemaConfig) -> Result<(), Vec<MnemaError>> {
    let mut errors = Vec::new();

    if config.agent.name.trim().is_empty() {
        errors.push(MnemaError::Config(
            "agent.name must not be empty".to_string(),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(MnemaError::Config(
            "storage.database_path must not be empty".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.memory.dedup_threshold) {
        errors.push(MnemaError::Config(format!(
            "memory.dedup_threshold must be in [0.0, 1.0], got {}",
            config.memory.dedup_threshold
        )));
    }

    if config.memory.retrieval_k == 0 {
        errors.push(MnemaError::Config(
            "memory.retrieval_k must be at least 1".to_string(),
        ));
    }

    if config.analyzer.classify_attempts == 0 {
        errors.push(MnemaError::Config(
            "analyzer.classify_attempts must be at least 1".to_string(),
        ));
    }

    if config.analyzer.backoff_cap_ms < config.analyzer.backoff_base_ms {
        errors.push(MnemaError::Config(format!(
            "analyzer.backoff_cap_ms ({}) must be >= analyzer.backoff_base_ms ({})",
            config.analyzer.backoff_cap_ms, config.analyzer.backoff_base_ms
        )));
    }

    if config.search.max_results == 0 {
        errors.push(MnemaError::Config(
            "search.max_results must be at least 1".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
