// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory store wrapper that fails selected kinds.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use moana_core::MoanaError;
use moana_memory::{MemoryKind, MemoryStore, Namespace, SearchHit, StoredItem};
use serde_json::Value;

/// Delegates to `inner` except for namespaces of a broken kind, which
/// return [`MoanaError::StoreUnavailable`].
pub struct FailingStore {
    inner: Arc<dyn MemoryStore>,
    broken: HashSet<MemoryKind>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn MemoryStore>, broken: impl IntoIterator<Item = MemoryKind>) -> Self {
        Self {
            inner,
            broken: broken.into_iter().collect(),
        }
    }

    /// Fails every kind.
    pub fn all(inner: Arc<dyn MemoryStore>) -> Self {
        Self::new(inner, MemoryKind::ALL)
    }

    fn check(&self, namespace: &Namespace) -> Result<(), MoanaError> {
        if self.broken.contains(&namespace.kind) {
            return Err(MoanaError::store_unavailable(
                namespace,
                std::io::Error::other("store offline"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for FailingStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<(), MoanaError> {
        self.check(namespace)?;
        self.inner.put(namespace, key, value).await
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<StoredItem>, MoanaError> {
        self.check(namespace)?;
        self.inner.get(namespace, key).await
    }

    async fn get_all(&self, namespace: &Namespace) -> Result<Vec<StoredItem>, MoanaError> {
        self.check(namespace)?;
        self.inner.get_all(namespace).await
    }

    async fn search(
        &self,
        namespace: &Namespace,
        query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, MoanaError> {
        self.check(namespace)?;
        self.inner.search(namespace, query, limit).await
    }

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<bool, MoanaError> {
        self.check(namespace)?;
        self.inner.delete(namespace, key).await
    }
}
