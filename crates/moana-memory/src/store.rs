// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Namespaced key-value store with similarity search.
//!
//! Every operation is scoped to a [`Namespace`]; nothing written under one
//! `(user, kind)` pair is visible from another. Writes are upserts and each
//! one is atomic per key.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moana_core::error::MoanaError;
use moana_core::traits::embedding::EmbeddingAdapter;
use serde_json::Value;

use crate::embedder::embed_one;
use crate::types::{cosine_similarity, value_text, Namespace, SearchHit, StoredItem};

/// Storage seam for long-term memory.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Inserts or replaces the value under `key`. Re-putting an identical
    /// value leaves the store unchanged apart from `updated_at`.
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<(), MoanaError>;

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<StoredItem>, MoanaError>;

    /// Every item in the namespace, most recently updated first.
    async fn get_all(&self, namespace: &Namespace) -> Result<Vec<StoredItem>, MoanaError>;

    /// Up to `limit` items ranked by similarity to `query`, best first.
    ///
    /// Without a query, items come back newest first and carry no score.
    async fn search(
        &self,
        namespace: &Namespace,
        query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, MoanaError>;

    /// Removes `key`. Returns whether it existed.
    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<bool, MoanaError>;
}

/// Orders `(item, embedding)` pairs by cosine similarity to `query`.
///
/// Ties fall back to recency, then key, so results are deterministic.
pub(crate) fn rank(
    query: &[f32],
    candidates: impl IntoIterator<Item = (StoredItem, Vec<f32>)>,
    limit: usize,
) -> Vec<SearchHit> {
    let mut scored: Vec<(f32, StoredItem)> = candidates
        .into_iter()
        .map(|(item, embedding)| (cosine_similarity(query, &embedding), item))
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| {
        sb.total_cmp(sa)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.key.cmp(&b.key))
    });
    scored
        .into_iter()
        .take(limit)
        .map(|(score, item)| SearchHit {
            key: item.key,
            value: item.value,
            score: Some(score),
        })
        .collect()
}

/// Newest-first ordering used by listings and queryless searches.
pub(crate) fn sort_newest_first(items: &mut [StoredItem]) {
    items.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.key.cmp(&b.key))
    });
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    embedding: Vec<f32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Entry {
    fn to_item(&self, key: &str) -> StoredItem {
        StoredItem {
            key: key.to_string(),
            value: self.value.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Process-local store. Contents are lost when the process exits.
pub struct InMemoryStore {
    embedder: Arc<dyn EmbeddingAdapter>,
    namespaces: RwLock<HashMap<Namespace, HashMap<String, Entry>>>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        Self {
            embedder,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    fn read_namespace<T>(
        &self,
        namespace: &Namespace,
        f: impl FnOnce(Option<&HashMap<String, Entry>>) -> T,
    ) -> T {
        let guard = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        f(guard.get(namespace))
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<(), MoanaError> {
        let embedding = embed_one(self.embedder.as_ref(), &value_text(&value)).await?;
        let now = Utc::now();
        let mut guard = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let entries = guard.entry(namespace.clone()).or_default();
        let created_at = entries.get(key).map_or(now, |e| e.created_at);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                embedding,
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<StoredItem>, MoanaError> {
        Ok(self.read_namespace(namespace, |entries| {
            entries.and_then(|e| e.get(key)).map(|entry| entry.to_item(key))
        }))
    }

    async fn get_all(&self, namespace: &Namespace) -> Result<Vec<StoredItem>, MoanaError> {
        let mut items = self.read_namespace(namespace, |entries| {
            entries
                .map(|e| e.iter().map(|(k, entry)| entry.to_item(k)).collect::<Vec<_>>())
                .unwrap_or_default()
        });
        sort_newest_first(&mut items);
        Ok(items)
    }

    async fn search(
        &self,
        namespace: &Namespace,
        query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, MoanaError> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let Some(query) = query else {
            let items = self.get_all(namespace).await?;
            return Ok(items
                .into_iter()
                .take(limit)
                .map(|item| SearchHit {
                    key: item.key,
                    value: item.value,
                    score: None,
                })
                .collect());
        };

        let query_vec = embed_one(self.embedder.as_ref(), query).await?;
        let candidates = self.read_namespace(namespace, |entries| {
            entries
                .map(|e| {
                    e.iter()
                        .map(|(k, entry)| (entry.to_item(k), entry.embedding.clone()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        });
        Ok(rank(&query_vec, candidates, limit))
    }

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<bool, MoanaError> {
        let mut guard = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .get_mut(namespace)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }
}
