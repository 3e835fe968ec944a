// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires configuration into a running agent.

use std::sync::Arc;

use colored::Colorize;
use moana_agent::{load_system_prompt, Agent, MemoryHooks};
use moana_anthropic::AnthropicProvider;
use moana_config::{split_model, EmbeddingProvider, MemoryBackend, MoanaConfig};
use moana_core::{EmbeddingAdapter, MoanaError, ProviderAdapter, StorageAdapter};
use moana_memory::{
    InMemoryStore, LlmOracle, LocalEmbedder, MemoryKind, MemoryStore, Namespace,
    OpenAiEmbedder, SqliteMemoryStore,
};
use moana_storage::SqliteStorage;
use tracing::{info, warn};

/// Storage, long-term store and (optionally) the agent built on them.
pub struct App {
    pub agent: Agent,
    storage: Arc<SqliteStorage>,
    store: Arc<dyn MemoryStore>,
}

/// Parts that need no model provider.
struct Backends {
    storage: Arc<SqliteStorage>,
    store: Arc<dyn MemoryStore>,
}

impl App {
    /// Full agent: checkpointer, long-term memory, Anthropic provider.
    pub async fn build(config: &MoanaConfig) -> Result<Self, MoanaError> {
        let Backends { storage, store } = open_backends(config).await?;

        let provider: Arc<dyn ProviderAdapter> =
            Arc::new(AnthropicProvider::new(config).inspect_err(|_| {
                eprintln!(
                    "error: Anthropic API key required. Set anthropic.api_key or ANTHROPIC_API_KEY"
                );
            })?);
        let template = load_system_prompt(&config.agent).await;

        let mut agent = Agent::new(config, template, Arc::clone(&provider), storage.clone());
        if config.memory.enabled {
            let (_, extraction_model) = split_model(&config.memory.extraction_model);
            let oracle = Arc::new(LlmOracle::new(provider, extraction_model));
            agent = agent
                .with_memory_tools(Arc::clone(&store), config.memory.max_search_results)
                .with_memory(MemoryHooks::from_config(
                    Arc::clone(&store),
                    oracle,
                    &config.memory,
                ));
        } else {
            info!("long-term memory disabled by configuration");
        }

        Ok(Self {
            agent,
            storage,
            store,
        })
    }

    pub async fn print_memories(&self, user_id: &str, kinds: &[MemoryKind]) {
        print_memories(self.store.as_ref(), user_id, kinds).await;
    }

    /// Flushes extraction and checkpoints the database.
    pub async fn close(&self) -> Result<(), MoanaError> {
        self.agent.shutdown().await;
        self.storage.close().await
    }
}

/// Read-only view used by `moana memories`.
pub struct Offline {
    storage: Arc<SqliteStorage>,
    store: Arc<dyn MemoryStore>,
}

impl Offline {
    pub async fn open(config: &MoanaConfig) -> Result<Self, MoanaError> {
        let Backends { storage, store } = open_backends(config).await?;
        Ok(Self { storage, store })
    }

    pub async fn print_memories(&self, user_id: &str, kinds: &[MemoryKind]) {
        print_memories(self.store.as_ref(), user_id, kinds).await;
    }

    pub async fn close(&self) -> Result<(), MoanaError> {
        self.storage.close().await
    }
}

async fn open_backends(config: &MoanaConfig) -> Result<Backends, MoanaError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage = Arc::new(storage);

    let embedder = embedder(config)?;
    let store: Arc<dyn MemoryStore> = match config.memory.backend {
        MemoryBackend::Sqlite => {
            let conn = storage.database()?.connection().clone();
            Arc::new(SqliteMemoryStore::new(conn, embedder))
        }
        MemoryBackend::Memory => {
            warn!("memory.backend = memory: long-term memory is lost on exit");
            Arc::new(InMemoryStore::new(embedder))
        }
    };
    Ok(Backends { storage, store })
}

fn embedder(config: &MoanaConfig) -> Result<Arc<dyn EmbeddingAdapter>, MoanaError> {
    let embedding = &config.embedding;
    if embedding.provider == EmbeddingProvider::OpenAi {
        let key = embedding
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());
        match key {
            Some(key) => {
                return Ok(Arc::new(OpenAiEmbedder::new(
                    &key,
                    embedding.model.clone(),
                    embedding.dimensions,
                )?));
            }
            None => warn!("no OpenAI API key found, falling back to the local embedder"),
        }
    }
    Ok(Arc::new(LocalEmbedder::new(embedding.dimensions)))
}

async fn print_memories(store: &dyn MemoryStore, user_id: &str, kinds: &[MemoryKind]) {
    for &kind in kinds {
        let namespace = Namespace::new(user_id, kind);
        println!("{}", namespace.to_string().bold());
        match store.get_all(&namespace).await {
            Ok(items) if items.is_empty() => println!("  {}", "(empty)".dimmed()),
            Ok(items) => {
                for item in items {
                    println!("  [{}] {}", item.key.cyan(), item.value);
                }
            }
            Err(e) => println!("  {}: {e}", "unavailable".red()),
        }
    }
}
