// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use moana_core::error::MoanaError;
use moana_memory::{
    Candidate, ConversationSnapshot, ExtractionOracle, ExtractionRequest, InMemoryStore,
    LocalEmbedder, MemoryKind, MemoryStore, Namespace, Role, SearchHit, StoredItem, Turn,
};
use serde_json::Value;

type Respond = dyn Fn(&ExtractionRequest) -> Result<Vec<Candidate>, MoanaError> + Send + Sync;

/// Oracle driven by a closure that records every request it sees.
pub struct ScriptedOracle {
    respond: Box<Respond>,
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl ScriptedOracle {
    pub fn new(
        respond: impl Fn(&ExtractionRequest) -> Result<Vec<Candidate>, MoanaError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Never proposes anything.
    pub fn silent() -> Arc<Self> {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn calls(&self, kind: MemoryKind) -> Vec<ExtractionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExtractionOracle for ScriptedOracle {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Vec<Candidate>, MoanaError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}

/// Store wrapper that fails every call touching one of `broken` kinds.
pub struct FlakyStore {
    inner: InMemoryStore,
    broken: HashSet<MemoryKind>,
}

impl FlakyStore {
    pub fn new(broken: impl IntoIterator<Item = MemoryKind>) -> Self {
        Self {
            inner: memory_store(),
            broken: broken.into_iter().collect(),
        }
    }

    fn check(&self, namespace: &Namespace) -> Result<(), MoanaError> {
        if self.broken.contains(&namespace.kind) {
            Err(MoanaError::store_unavailable(
                namespace,
                std::io::Error::other("disk on fire"),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MemoryStore for FlakyStore {
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

pub fn memory_store() -> InMemoryStore {
    InMemoryStore::new(Arc::new(LocalEmbedder::new(256)))
}

pub fn snapshot(user_id: &str, exchanges: &[(&str, &str)]) -> ConversationSnapshot {
    let mut turns = vec![Turn::new(Role::System, "You are a helpful AI assistant.")];
    for (user, assistant) in exchanges {
        turns.push(Turn::new(Role::User, *user));
        turns.push(Turn::new(Role::Assistant, *assistant));
    }
    ConversationSnapshot::new(user_id, turns)
}
