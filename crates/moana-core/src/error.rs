// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Moana agent.

use thiserror::Error;

/// Boxed error source carried by several variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all Moana adapter traits and core operations.
#[derive(Debug, Error)]
pub enum MoanaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Short-term storage errors (checkpointer database, query failure, serialization).
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// The long-term memory store could not serve an operation on a namespace.
    ///
    /// Surfaced only to the caller of that read or write; the session keeps going.
    #[error("memory store unavailable for {namespace}: {source}")]
    StoreUnavailable { namespace: String, source: BoxError },

    /// The extraction oracle failed or returned malformed data for one kind.
    #[error("extraction failed for {kind}: {message}")]
    Extraction { kind: String, message: String },

    /// LLM or embedding provider errors (API failure, token limits, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<BoxError>,
    },

    /// Tool execution errors (bad input, unknown tool, handler failure).
    #[error("tool error: {message}")]
    Tool {
        message: String,
        source: Option<BoxError>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MoanaError {
    /// Wraps any error as a [`MoanaError::Storage`].
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Wraps any error as a [`MoanaError::StoreUnavailable`] for `namespace`.
    pub fn store_unavailable(
        namespace: impl ToString,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StoreUnavailable {
            namespace: namespace.to_string(),
            source: Box::new(err),
        }
    }

    /// Builds a [`MoanaError::Extraction`] for the given memory kind.
    pub fn extraction(kind: impl ToString, message: impl Into<String>) -> Self {
        Self::Extraction {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    /// Returns true when the error only concerns long-term memory.
    ///
    /// Such errors never abort a conversation turn; background extraction
    /// logs them as warnings and anything else as an error.
    pub fn is_memory_error(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. } | Self::Extraction { .. })
    }
}
