// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./moana.toml` > `~/.config/moana/moana.toml` > `/etc/moana/moana.toml`
//! with environment variable overrides via the `MOANA_` prefix, per-run overrides,
//! and finally the bare `USER_ID`, `MODEL`, `SYSTEM_PROMPT` and `MAX_SEARCH_RESULTS`
//! variables, which win over everything else.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::Serialize;

use crate::model::MoanaConfig;

/// Bare environment variables and the config keys they set.
const BARE_ENV_KEYS: &[(&str, &str)] = &[
    ("user_id", "agent.user_id"),
    ("model", "agent.model"),
    ("system_prompt", "agent.system_prompt"),
    ("max_search_results", "memory.max_search_results"),
];

/// Values supplied for a single run, typically from CLI flags.
///
/// These sit above files and `MOANA_*` variables but below the bare
/// environment variables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_search_results: Option<usize>,
}

impl RunOverrides {
    /// Merges each set override into `figment` at its config key.
    fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(user_id) = &self.user_id {
            figment = figment.merge(("agent.user_id", user_id));
        }
        if let Some(model) = &self.model {
            figment = figment.merge(("agent.model", model));
        }
        if let Some(prompt) = &self.system_prompt {
            figment = figment.merge(("agent.system_prompt", prompt));
        }
        if let Some(limit) = self.max_search_results {
            figment = figment.merge(("memory.max_search_results", limit));
        }
        figment
    }
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/moana/moana.toml` (system-wide)
/// 3. `~/.config/moana/moana.toml` (user XDG config)
/// 4. `./moana.toml` (local directory)
/// 5. `MOANA_*` environment variables
/// 6. Bare `USER_ID`, `MODEL`, `SYSTEM_PROMPT`, `MAX_SEARCH_RESULTS`
pub fn load_config() -> Result<MoanaConfig, figment::Error> {
    load_config_with(&RunOverrides::default())
}

/// Same as [`load_config`], with per-run overrides layered below the bare variables.
pub fn load_config_with(overrides: &RunOverrides) -> Result<MoanaConfig, figment::Error> {
    build_figment(overrides).extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no environment).
pub fn load_config_from_str(toml_content: &str) -> Result<MoanaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MoanaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(
    path: &Path,
    overrides: &RunOverrides,
) -> Result<MoanaConfig, figment::Error> {
    let figment = Figment::new()
        .merge(Serialized::defaults(MoanaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider());
    overrides
        .apply(figment)
        .merge(bare_env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment(overrides: &RunOverrides) -> Figment {
    let figment = Figment::new()
        .merge(Serialized::defaults(MoanaConfig::default()))
        .merge(Toml::file("/etc/moana/moana.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("moana/moana.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("moana.toml"))
        .merge(env_provider());
    overrides.apply(figment).merge(bare_env_provider())
}

/// `MOANA_<SECTION>_<FIELD>` → `section.field`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because field names
/// contain underscores: `MOANA_MEMORY_EXTRACTION_DELAY_MS` must map to
/// `memory.extraction_delay_ms`.
fn env_provider() -> Env {
    Env::prefixed("MOANA_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = ["agent", "anthropic", "embedding", "storage", "memory"]
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(&format!("{section}_"))
                    .map(|field| format!("{section}.{field}"))
            })
            .unwrap_or(key_str);
        mapped.into()
    })
}

/// The unprefixed variables that take precedence over every other layer.
fn bare_env_provider() -> Env {
    Env::raw()
        .filter(|key| bare_env_target(key.as_str()).is_some())
        .map(|key| {
            bare_env_target(key.as_str())
                .unwrap_or_default()
                .to_string()
                .into()
        })
}

fn bare_env_target(key: &str) -> Option<&'static str> {
    BARE_ENV_KEYS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, target)| *target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_env_targets_are_case_insensitive() {
        assert_eq!(bare_env_target("USER_ID"), Some("agent.user_id"));
        assert_eq!(bare_env_target("max_search_results"), Some("memory.max_search_results"));
        assert_eq!(bare_env_target("HOME"), None);
    }

    #[test]
    fn bare_env_beats_overrides_and_prefixed_env() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("MOANA_AGENT_USER_ID", "from-prefixed");
            jail.set_env("USER_ID", "from-bare");
            jail.set_env("MOANA_MEMORY_EXTRACTION_DELAY_MS", "250");

            let overrides = RunOverrides {
                user_id: Some("from-flag".into()),
                max_search_results: Some(4),
                ..Default::default()
            };
            let config = load_config_with(&overrides)?;

            assert_eq!(config.agent.user_id, "from-bare");
            assert_eq!(config.memory.max_search_results, 4);
            assert_eq!(config.memory.extraction_delay_ms, 250);
            Ok(())
        });
    }

    #[test]
    fn overrides_beat_files() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "moana.toml",
                r#"
[agent]
user_id = "from-file"
model = "anthropic/claude-3-haiku"
"#,
            )?;

            let overrides = RunOverrides {
                user_id: Some("from-flag".into()),
                ..Default::default()
            };
            let config = load_config_with(&overrides)?;

            assert_eq!(config.agent.user_id, "from-flag");
            assert_eq!(config.agent.model, "anthropic/claude-3-haiku");
            Ok(())
        });
    }
}
