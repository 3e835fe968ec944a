// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Moana agent.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Moana workspace.

pub mod error;
pub mod traits;
pub mod types;

pub use error::MoanaError;
pub use types::{
    AdapterType, ContentBlock, HealthStatus, Message, MessageId, ProviderMessage,
    ProviderRequest, ProviderResponse, Session, SessionId, TokenUsage, ToolUseData,
};

pub use traits::{EmbeddingAdapter, PluginAdapter, ProviderAdapter, StorageAdapter};
