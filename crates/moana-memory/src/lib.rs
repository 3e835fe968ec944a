// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term memory for the Moana agent.
//!
//! Records live in a namespaced [`MemoryStore`], partitioned by user and
//! [`MemoryKind`]. After each turn the session loop hands a
//! [`ConversationSnapshot`] to the [`ExtractionScheduler`], which debounces
//! it and runs the [`MemoryExtractor`] once per kind. Before each model call
//! the [`RecallAssembler`] renders what is stored into the system prompt.

pub mod embedder;
pub mod extractor;
pub mod oracle;
pub mod recall;
pub mod scheduler;
pub mod sqlite;
pub mod store;
pub mod types;

pub use embedder::{LocalEmbedder, OpenAiEmbedder};
pub use extractor::{ExtractionReport, MemoryExtractor};
pub use oracle::{Candidate, ExtractionOracle, ExtractionRequest, LlmOracle};
pub use recall::{RecallAssembler, RecallLimits};
pub use scheduler::{ExtractionScheduler, SubmitOutcome};
pub use sqlite::SqliteMemoryStore;
pub use store::{InMemoryStore, MemoryStore};
pub use types::{
    ConversationSnapshot, MemoryKind, MemoryRecord, Namespace, Profile, Role, SearchHit,
    StoredItem, Triple, Turn, PROFILE_KEY,
};
