// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end agent tests.
//!
//! `TestHarness` assembles an [`Agent`] over an in-memory SQLite
//! checkpointer, an in-memory long-term store with the local embedder, a
//! [`MockProvider`] and a [`StubOracle`].

use std::sync::Arc;

use moana_agent::{Agent, MemoryHooks, TurnOutcome};
use moana_config::model::MoanaConfig;
use moana_core::types::{ProviderResponse, Session};
use moana_core::MoanaError;
use moana_memory::{InMemoryStore, LocalEmbedder, MemoryKind, MemoryStore, Namespace, StoredItem};
use moana_storage::{Database, SqliteStorage};
use serde_json::Value;

use crate::failing_store::FailingStore;
use crate::mock_provider::MockProvider;
use crate::stub_oracle::StubOracle;

const EMBEDDING_DIMENSIONS: usize = 256;

/// Builder for test environments.
pub struct TestHarnessBuilder {
    responses: Vec<ProviderResponse>,
    system_prompt: Option<String>,
    user_id: String,
    max_steps: Option<usize>,
    memory: bool,
    memory_tools: bool,
    broken_kinds: Vec<MemoryKind>,
    extraction_delay_ms: u64,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            system_prompt: None,
            user_id: "test-user".to_string(),
            max_steps: None,
            memory: true,
            memory_tools: false,
            broken_kinds: Vec::new(),
            extraction_delay_ms: 0,
        }
    }

    pub fn with_responses(mut self, responses: Vec<ProviderResponse>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Runs the agent without long-term memory.
    pub fn without_memory(mut self) -> Self {
        self.memory = false;
        self
    }

    /// Registers `manage_memory` and `search_memory`.
    pub fn with_memory_tools(mut self) -> Self {
        self.memory_tools = true;
        self
    }

    /// Makes the agent's view of the store fail for `kinds`.
    pub fn with_broken_kinds(mut self, kinds: impl IntoIterator<Item = MemoryKind>) -> Self {
        self.broken_kinds = kinds.into_iter().collect();
        self
    }

    pub fn with_extraction_delay_ms(mut self, delay_ms: u64) -> Self {
        self.extraction_delay_ms = delay_ms;
        self
    }

    pub async fn build(self) -> Result<TestHarness, MoanaError> {
        let mut config = MoanaConfig::default();
        config.agent.user_id = self.user_id;
        if let Some(max_steps) = self.max_steps {
            config.agent.max_steps = max_steps;
        }
        if let Some(prompt) = self.system_prompt {
            config.agent.system_prompt = prompt;
        }
        config.memory.enabled = self.memory;
        config.memory.extraction_delay_ms = self.extraction_delay_ms;

        let storage = Arc::new(SqliteStorage::from_database(
            Database::open_in_memory().await?,
        ));
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new(Arc::new(
            LocalEmbedder::new(EMBEDDING_DIMENSIONS),
        )));
        let agent_store: Arc<dyn MemoryStore> = if self.broken_kinds.is_empty() {
            Arc::clone(&store)
        } else {
            Arc::new(FailingStore::new(Arc::clone(&store), self.broken_kinds))
        };
        let provider = Arc::new(MockProvider::with_responses(self.responses));
        let oracle = Arc::new(StubOracle::new());

        let mut agent = Agent::new(
            &config,
            config.agent.system_prompt.clone(),
            provider.clone(),
            storage.clone(),
        );
        if self.memory {
            agent = agent.with_memory(MemoryHooks::from_config(
                Arc::clone(&agent_store),
                oracle.clone(),
                &config.memory,
            ));
        }
        if self.memory_tools {
            agent = agent.with_memory_tools(agent_store, config.memory.max_search_results);
        }

        Ok(TestHarness {
            provider,
            storage,
            store,
            oracle,
            agent,
            config,
        })
    }
}

/// A fully wired agent plus handles on every mock behind it.
pub struct TestHarness {
    pub provider: Arc<MockProvider>,
    pub storage: Arc<SqliteStorage>,
    /// The healthy store, bypassing any broken kinds.
    pub store: Arc<dyn MemoryStore>,
    pub oracle: Arc<StubOracle>,
    pub agent: Agent,
    pub config: MoanaConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<Self, MoanaError> {
        Self::builder().build().await
    }

    pub async fn start_session(&self) -> Result<Session, MoanaError> {
        self.agent.start_session().await
    }

    pub async fn send(&self, session_id: &str, text: &str) -> Result<TurnOutcome, MoanaError> {
        self.agent.send(session_id, text).await
    }

    /// Waits for every pending extraction to finish.
    pub async fn flush(&self) {
        self.agent.shutdown().await;
    }

    fn namespace(&self, kind: MemoryKind) -> Namespace {
        Namespace::new(self.agent.user_id(), kind)
    }

    /// Writes a record directly into the harness user's namespace.
    pub async fn seed(&self, kind: MemoryKind, key: &str, value: Value) -> Result<(), MoanaError> {
        self.store.put(&self.namespace(kind), key, value).await
    }

    /// Every stored record of `kind` for the harness user.
    pub async fn records(&self, kind: MemoryKind) -> Result<Vec<StoredItem>, MoanaError> {
        self.store.get_all(&self.namespace(kind)).await
    }
}
