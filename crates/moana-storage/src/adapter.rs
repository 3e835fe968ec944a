// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use moana_config::model::StorageConfig;
use moana_core::types::{Message, Session};
use moana_core::{AdapterType, HealthStatus, MoanaError, PluginAdapter, StorageAdapter};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed conversation checkpointer.
///
/// The database is opened lazily by [`StorageAdapter::initialize`]. Once open,
/// [`SqliteStorage::database`] hands out the same connection to the durable
/// memory store so both share one writer thread.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wraps an already-open database (tests, in-memory runs).
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                database_path: ":memory:".to_string(),
                wal_mode: false,
            },
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Returns the underlying database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, MoanaError> {
        self.db.get().ok_or_else(|| MoanaError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MoanaError> {
        self.database()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MoanaError> {
        if self.db.initialized() && self.config.wal_mode {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), MoanaError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| MoanaError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), MoanaError> {
        self.database()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn create_session(&self, session: &Session) -> Result<(), MoanaError> {
        queries::sessions::create_session(self.database()?, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, MoanaError> {
        queries::sessions::get_session(self.database()?, id).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, MoanaError> {
        queries::sessions::list_sessions(self.database()?, user_id).await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), MoanaError> {
        queries::messages::insert_message(self.database()?, message).await
    }

    async fn get_messages(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, MoanaError> {
        queries::messages::get_messages_for_session(self.database()?, session_id, limit).await
    }
}
