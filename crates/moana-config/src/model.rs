// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Moana agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Default system prompt template.
///
/// `{user_info}` receives the recalled long-term memory block and
/// `{system_time}` the current UTC time.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant.{user_info}\n\nSystem time: {system_time}";

/// Top-level Moana configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MoanaConfig {
    /// Conversation identity and loop settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Embedding backend used for memory similarity search.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Short-term checkpoint storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Long-term memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// The user whose memories are read and written.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Chat model in `provider/model-name` form.
    #[serde(default = "default_model")]
    pub model: String,

    /// System prompt template. Overridden by `system_prompt_file` if both set.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Path to a file containing the system prompt template.
    #[serde(default)]
    pub system_prompt_file: Option<String>,

    /// Maximum model calls per user turn before the loop gives up.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            system_prompt_file: None,
            max_steps: default_max_steps(),
            log_level: default_log_level(),
        }
    }
}

fn default_user_id() -> String {
    "default".to_string()
}

fn default_model() -> String {
    "anthropic/claude-3-5-sonnet-20240620".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_max_steps() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires the `ANTHROPIC_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Which embedder backs similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI `/v1/embeddings`.
    #[default]
    OpenAi,
    /// Deterministic in-process hashing embedder.
    Local,
}

/// Embedding backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Remote embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector width.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// OpenAI API key. `None` requires the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            api_key: None,
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    1536
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("moana").join("moana.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("moana.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Where long-term memories live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackend {
    /// `memory_items` table in the storage database.
    #[default]
    Sqlite,
    /// Process-local map, lost on exit.
    Memory,
}

/// Long-term memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Enable long-term memory. When false, no recall or extraction occurs.
    #[serde(default = "default_memory_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: MemoryBackend,

    /// Model used by the extraction oracle, `provider/model-name`.
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,

    /// Debounce window for extraction submissions, in milliseconds.
    #[serde(default = "default_extraction_delay_ms")]
    pub extraction_delay_ms: u64,

    /// Upper bound on how long a pending extraction can keep being pushed back.
    #[serde(default = "default_max_batch_wait_ms")]
    pub max_batch_wait_ms: u64,

    /// Number of trailing turns used to build the recall query.
    #[serde(default = "default_recall_turns")]
    pub recall_turns: usize,

    /// Free-text memories surfaced per recall.
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,

    /// Triples surfaced per recall.
    #[serde(default = "default_triple_limit")]
    pub triple_limit: usize,

    /// Result cap for memory search tools and for existing records shown to the oracle.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Memory kinds extracted after each turn.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_memory_enabled(),
            backend: MemoryBackend::default(),
            extraction_model: default_extraction_model(),
            extraction_delay_ms: default_extraction_delay_ms(),
            max_batch_wait_ms: default_max_batch_wait_ms(),
            recall_turns: default_recall_turns(),
            memory_limit: default_memory_limit(),
            triple_limit: default_triple_limit(),
            max_search_results: default_max_search_results(),
            kinds: default_kinds(),
        }
    }
}

fn default_memory_enabled() -> bool {
    true
}

fn default_extraction_model() -> String {
    "anthropic/claude-3-5-sonnet-latest".to_string()
}

fn default_extraction_delay_ms() -> u64 {
    500
}

fn default_max_batch_wait_ms() -> u64 {
    5_000
}

fn default_recall_turns() -> usize {
    3
}

fn default_memory_limit() -> usize {
    3
}

fn default_triple_limit() -> usize {
    20
}

fn default_max_search_results() -> usize {
    10
}

fn default_kinds() -> Vec<String> {
    ["memories", "triples", "profile"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

/// Model providers this build can talk to.
pub const SUPPORTED_PROVIDERS: &[&str] = &["anthropic"];

/// Splits a `provider/model-name` reference.
///
/// A bare model name is assumed to be an Anthropic model.
pub fn split_model(qualified: &str) -> (&str, &str) {
    match qualified.split_once('/') {
        Some((provider, name)) => (provider, name),
        None => ("anthropic", qualified),
    }
}
