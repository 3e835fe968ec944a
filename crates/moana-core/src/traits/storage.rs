// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the short-term conversation checkpointer.

use async_trait::async_trait;

use crate::error::MoanaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Message, Session};

/// Adapter for persisting sessions and their transcripts.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, pragmas).
    async fn initialize(&self) -> Result<(), MoanaError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), MoanaError>;

    async fn create_session(&self, session: &Session) -> Result<(), MoanaError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, MoanaError>;

    /// Lists sessions for a user, most recently updated first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, MoanaError>;

    async fn insert_message(&self, message: &Message) -> Result<(), MoanaError>;

    /// Returns messages in chronological order; `limit` keeps only the newest.
    async fn get_messages(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, MoanaError>;
}
