// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable memory store over the `memory_items` table.
//!
//! Values are JSON text, embeddings are little-endian f32 BLOBs. Similarity
//! ranking happens in process after loading a namespace's embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use moana_core::error::MoanaError;
use moana_core::traits::embedding::EmbeddingAdapter;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::embedder::embed_one;
use crate::store::{rank, sort_newest_first, MemoryStore};
use crate::types::{blob_to_vec, value_text, vec_to_blob, Namespace, SearchHit, StoredItem};

/// [`MemoryStore`] persisted in SQLite.
///
/// The connection must already carry the `memory_items` schema.
pub struct SqliteMemoryStore {
    conn: Connection,
    embedder: Arc<dyn EmbeddingAdapter>,
}

/// Raw row before JSON and timestamp decoding.
struct RawItem {
    key: String,
    value: String,
    embedding: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

fn raw_from_row(row: &Row<'_>) -> rusqlite::Result<RawItem> {
    Ok(RawItem {
        key: row.get(0)?,
        value: row.get(1)?,
        embedding: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(namespace: &Namespace, text: &str) -> Result<DateTime<Utc>, MoanaError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MoanaError::store_unavailable(namespace, e))
}

impl RawItem {
    fn decode(self, namespace: &Namespace) -> Result<(StoredItem, Vec<f32>), MoanaError> {
        let value: Value = serde_json::from_str(&self.value)
            .map_err(|e| MoanaError::store_unavailable(namespace, e))?;
        let item = StoredItem {
            key: self.key,
            value,
            created_at: parse_timestamp(namespace, &self.created_at)?,
            updated_at: parse_timestamp(namespace, &self.updated_at)?,
        };
        let embedding = self.embedding.as_deref().map(blob_to_vec).unwrap_or_default();
        Ok((item, embedding))
    }
}

impl SqliteMemoryStore {
    pub fn new(conn: Connection, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        Self { conn, embedder }
    }

    async fn load_all(&self, namespace: &Namespace) -> Result<Vec<(StoredItem, Vec<f32>)>, MoanaError> {
        let user_id = namespace.user_id.clone();
        let kind = namespace.kind.as_str();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT key, value, embedding, created_at, updated_at
                     FROM memory_items WHERE user_id = ?1 AND kind = ?2",
                )?;
                let rows = stmt
                    .query_map(params![user_id, kind], raw_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, rusqlite::Error>(rows)
            })
            .await
            .map_err(|e| MoanaError::store_unavailable(namespace, e))?;

        rows.into_iter().map(|raw| raw.decode(namespace)).collect()
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<(), MoanaError> {
        let embedding = embed_one(self.embedder.as_ref(), &value_text(&value)).await?;
        let blob = vec_to_blob(&embedding);
        let json = serde_json::to_string(&value).map_err(|e| MoanaError::store_unavailable(namespace, e))?;
        let now = timestamp(Utc::now());
        let user_id = namespace.user_id.clone();
        let kind = namespace.kind.as_str();
        let key = key.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO memory_items (user_id, kind, key, value, embedding, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     ON CONFLICT (user_id, kind, key) DO UPDATE SET
                         value = excluded.value,
                         embedding = excluded.embedding,
                         updated_at = excluded.updated_at",
                    params![user_id, kind, key, json, blob, now],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .map_err(|e| MoanaError::store_unavailable(namespace, e))?;
        debug!(namespace = %namespace, "memory item written");
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<StoredItem>, MoanaError> {
        let user_id = namespace.user_id.clone();
        let kind = namespace.kind.as_str();
        let key = key.to_string();
        let raw = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT key, value, embedding, created_at, updated_at
                     FROM memory_items WHERE user_id = ?1 AND kind = ?2 AND key = ?3",
                    params![user_id, kind, key],
                    raw_from_row,
                )
                .optional()
            })
            .await
            .map_err(|e| MoanaError::store_unavailable(namespace, e))?;

        raw.map(|r| r.decode(namespace).map(|(item, _)| item)).transpose()
    }

    async fn get_all(&self, namespace: &Namespace) -> Result<Vec<StoredItem>, MoanaError> {
        let mut items: Vec<StoredItem> = self
            .load_all(namespace)
            .await?
            .into_iter()
            .map(|(item, _)| item)
            .collect();
        sort_newest_first(&mut items);
        Ok(items)
    }

    async fn search(
        &self,
        namespace: &Namespace,
        query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, MoanaError> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => {
                let query_vec = embed_one(self.embedder.as_ref(), query).await?;
                Ok(rank(&query_vec, self.load_all(namespace).await?, limit))
            }
            None => Ok(self
                .get_all(namespace)
                .await?
                .into_iter()
                .take(limit)
                .map(|item| SearchHit {
                    key: item.key,
                    value: item.value,
                    score: None,
                })
                .collect()),
        }
    }

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<bool, MoanaError> {
        let user_id = namespace.user_id.clone();
        let kind = namespace.kind.as_str();
        let key = key.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM memory_items WHERE user_id = ?1 AND kind = ?2 AND key = ?3",
                    params![user_id, kind, key],
                )
            })
            .await
            .map_err(|e| MoanaError::store_unavailable(namespace, e))?;
        Ok(removed > 0)
    }
}
