// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express: non-empty
//! identifiers, supported model providers, positive limits and a sane
//! debounce window.

use crate::diagnostic::ConfigError;
use crate::model::{split_model, MoanaConfig, SUPPORTED_PROVIDERS};

/// Memory kinds the extractor knows how to produce.
const KNOWN_KINDS: &[&str] = &["memories", "triples", "profile"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &MoanaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.agent.user_id.trim().is_empty() {
        fail("agent.user_id must not be empty".to_string());
    }

    for (key, model) in [
        ("agent.model", &config.agent.model),
        ("memory.extraction_model", &config.memory.extraction_model),
    ] {
        let (provider, name) = split_model(model);
        if !SUPPORTED_PROVIDERS.contains(&provider) {
            fail(format!(
                "{key} uses unsupported provider `{provider}` (supported: {})",
                SUPPORTED_PROVIDERS.join(", ")
            ));
        } else if name.trim().is_empty() {
            fail(format!("{key} `{model}` has no model name"));
        }
    }

    if config.agent.max_steps == 0 {
        fail("agent.max_steps must be at least 1".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.embedding.dimensions == 0 {
        fail("embedding.dimensions must be at least 1".to_string());
    }

    let memory = &config.memory;
    for (key, value) in [
        ("memory.recall_turns", memory.recall_turns),
        ("memory.memory_limit", memory.memory_limit),
        ("memory.triple_limit", memory.triple_limit),
        ("memory.max_search_results", memory.max_search_results),
    ] {
        if value == 0 {
            fail(format!("{key} must be at least 1"));
        }
    }

    if memory.extraction_delay_ms > memory.max_batch_wait_ms {
        fail(format!(
            "memory.extraction_delay_ms ({}) must not exceed memory.max_batch_wait_ms ({})",
            memory.extraction_delay_ms, memory.max_batch_wait_ms
        ));
    }

    for kind in &memory.kinds {
        if !KNOWN_KINDS.contains(&kind.to_ascii_lowercase().as_str()) {
            fail(format!(
                "memory.kinds contains unknown kind `{kind}` (expected one of: {})",
                KNOWN_KINDS.join(", ")
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
