// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation loop.
//!
//! A turn alternates between calling the model and running the tools it
//! asks for, up to `max_steps` model calls. Before every call the recall
//! block is rebuilt from long-term memory, and after every reply the
//! conversation is handed to the extraction scheduler. Neither memory
//! path can fail a turn.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use moana_config::model::{MemoryConfig, MoanaConfig};
use moana_config::split_model;
use moana_core::error::MoanaError;
use moana_core::types::{Message, ProviderRequest, ProviderResponse, Session};
use moana_core::{ProviderAdapter, StorageAdapter};
use moana_memory::{
    ConversationSnapshot, ExtractionOracle, ExtractionScheduler, MemoryExtractor, MemoryKind,
    MemoryStore, RecallAssembler, RecallLimits, Role, Turn,
};
use tracing::{debug, info, warn};

use crate::context::{self, AssistantMeta, ToolResultMeta};
use crate::tool::{Tool, ToolRegistry};
use crate::tools::{ManageMemoryTool, SearchMemoryTool};

/// Reply persisted when the model is still asking for tools on the last step.
pub const STEP_LIMIT_REPLY: &str =
    "Sorry, I could not find an answer to your question in the specified number of steps.";

/// Result of one user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final text shown to the user.
    pub reply: String,
    /// Model calls made.
    pub steps: usize,
    /// Tools run across all steps.
    pub tool_calls: usize,
    /// True when the step budget ran out.
    pub exhausted: bool,
}

/// Long-term memory wiring for an [`Agent`].
pub struct MemoryHooks {
    recall: Arc<RecallAssembler>,
    scheduler: ExtractionScheduler,
    extraction_delay: Duration,
}

impl MemoryHooks {
    pub fn new(
        recall: Arc<RecallAssembler>,
        scheduler: ExtractionScheduler,
        extraction_delay: Duration,
    ) -> Self {
        Self {
            recall,
            scheduler,
            extraction_delay,
        }
    }

    /// Builds recall and extraction over `store` from the memory config.
    ///
    /// Unknown kind names are skipped with a warning; validation rejects
    /// them before this point in normal runs.
    pub fn from_config(
        store: Arc<dyn MemoryStore>,
        oracle: Arc<dyn ExtractionOracle>,
        config: &MemoryConfig,
    ) -> Self {
        let kinds: Vec<MemoryKind> = config
            .kinds
            .iter()
            .filter_map(|name| match name.parse::<MemoryKind>() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    warn!(kind = name.as_str(), "ignoring unknown memory kind");
                    None
                }
            })
            .collect();

        let extractor = Arc::new(MemoryExtractor::new(Arc::clone(&store), oracle));
        let scheduler = ExtractionScheduler::new(
            extractor,
            kinds,
            Duration::from_millis(config.max_batch_wait_ms),
        );
        let recall = Arc::new(RecallAssembler::new(store, RecallLimits::from(config)));
        Self::new(
            recall,
            scheduler,
            Duration::from_millis(config.extraction_delay_ms),
        )
    }

    pub fn scheduler(&self) -> &ExtractionScheduler {
        &self.scheduler
    }
}

/// A conversational agent bound to one user.
pub struct Agent {
    user_id: String,
    model: String,
    max_tokens: u32,
    max_steps: usize,
    template: String,
    provider: Arc<dyn ProviderAdapter>,
    storage: Arc<dyn StorageAdapter>,
    tools: ToolRegistry,
    memory: Option<MemoryHooks>,
}

impl Agent {
    /// Creates an agent for `config.agent.user_id` with no tools and no memory.
    pub fn new(
        config: &MoanaConfig,
        template: impl Into<String>,
        provider: Arc<dyn ProviderAdapter>,
        storage: Arc<dyn StorageAdapter>,
    ) -> Self {
        let (_, model) = split_model(&config.agent.model);
        Self {
            user_id: config.agent.user_id.clone(),
            model: model.to_string(),
            max_tokens: config.anthropic.max_tokens,
            max_steps: config.agent.max_steps.max(1),
            template: template.into(),
            provider,
            storage,
            tools: ToolRegistry::new(),
            memory: None,
        }
    }

    /// Overrides the user. Call before [`Agent::with_memory_tools`].
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_memory(mut self, hooks: MemoryHooks) -> Self {
        self.memory = Some(hooks);
        self
    }

    /// Registers `manage_memory` and `search_memory` for the current user.
    pub fn with_memory_tools(mut self, store: Arc<dyn MemoryStore>, max_results: usize) -> Self {
        self.tools.register(Arc::new(ManageMemoryTool::new(
            Arc::clone(&store),
            &self.user_id,
        )));
        self.tools.register(Arc::new(SearchMemoryTool::new(
            store,
            &self.user_id,
            max_results,
        )));
        self
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        self.tools.register(tool);
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn memory(&self) -> Option<&MemoryHooks> {
        self.memory.as_ref()
    }

    /// Creates and checkpoints a new session.
    pub async fn start_session(&self) -> Result<Session, MoanaError> {
        let now = timestamp();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.storage.create_session(&session).await?;
        info!(session_id = %session.id, user_id = %self.user_id, "session started");
        Ok(session)
    }

    /// Loads a checkpointed session owned by this agent's user.
    pub async fn resume(&self, session_id: &str) -> Result<Session, MoanaError> {
        match self.storage.get_session(session_id).await? {
            Some(session) if session.user_id == self.user_id => {
                info!(session_id, "session resumed");
                Ok(session)
            }
            Some(_) | None => Err(MoanaError::Internal(format!(
                "no session {session_id} for user {}",
                self.user_id
            ))),
        }
    }

    /// Runs one user turn to completion.
    pub async fn send(&self, session_id: &str, text: &str) -> Result<TurnOutcome, MoanaError> {
        self.persist(session_id, "user", text, None).await?;
        counter!("moana_agent_turns_total").increment(1);

        let tool_definitions = if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.tool_definitions())
        };
        let mut tool_calls = 0;

        for step in 1..=self.max_steps {
            let history = self.storage.get_messages(session_id, None).await?;
            let turns = context::to_turns(&history);

            let user_info = match &self.memory {
                Some(memory) => memory.recall.recall(&self.user_id, &turns).await,
                None => String::new(),
            };
            let system_prompt = context::render_system_prompt(&self.template, &user_info);

            let request = ProviderRequest {
                model: self.model.clone(),
                system_prompt: Some(system_prompt.clone()),
                messages: context::to_provider_messages(&history),
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };
            let response = self.provider.complete(request).await?;
            debug!(
                session_id,
                step,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                tool_uses = response.tool_uses.len(),
                "model replied"
            );

            if response.wants_tools() && step == self.max_steps {
                warn!(session_id, steps = step, "step budget exhausted");
                self.persist(session_id, "assistant", STEP_LIMIT_REPLY, None)
                    .await?;
                self.schedule_extraction(&system_prompt, turns, STEP_LIMIT_REPLY);
                return Ok(TurnOutcome {
                    reply: STEP_LIMIT_REPLY.to_string(),
                    steps: step,
                    tool_calls,
                    exhausted: true,
                });
            }

            self.persist_reply(session_id, &response).await?;
            self.schedule_extraction(&system_prompt, turns, &response.content);

            if !response.wants_tools() {
                return Ok(TurnOutcome {
                    reply: response.content,
                    steps: step,
                    tool_calls,
                    exhausted: false,
                });
            }

            for tool_use in &response.tool_uses {
                let output = self
                    .tools
                    .dispatch(&tool_use.name, tool_use.input.clone())
                    .await;
                tool_calls += 1;
                debug!(
                    session_id,
                    tool = tool_use.name.as_str(),
                    is_error = output.is_error,
                    "tool finished"
                );
                let meta = ToolResultMeta {
                    tool_use_id: tool_use.id.clone(),
                    is_error: output.is_error,
                };
                self.persist(session_id, "tool", &output.content, Some(encode(&meta)?))
                    .await?;
            }
        }

        // max_steps >= 1 and the last step always returns above.
        Err(MoanaError::Internal("agent loop ended without a reply".into()))
    }

    /// Flushes pending extraction.
    pub async fn shutdown(&self) {
        if let Some(memory) = &self.memory {
            memory.scheduler.shutdown().await;
        }
    }

    fn schedule_extraction(&self, system_prompt: &str, history: Vec<Turn>, reply: &str) {
        let Some(memory) = &self.memory else {
            return;
        };
        let mut turns = Vec::with_capacity(history.len() + 2);
        turns.push(Turn::new(Role::System, system_prompt));
        turns.extend(history);
        if !reply.is_empty() {
            turns.push(Turn::new(Role::Assistant, reply));
        }
        let snapshot = ConversationSnapshot::new(self.user_id.clone(), turns);
        memory.scheduler.submit(snapshot, memory.extraction_delay);
    }

    async fn persist_reply(
        &self,
        session_id: &str,
        response: &ProviderResponse,
    ) -> Result<(), MoanaError> {
        let metadata = if response.tool_uses.is_empty() {
            None
        } else {
            Some(encode(&AssistantMeta {
                tool_uses: response.tool_uses.clone(),
            })?)
        };
        self.persist(session_id, "assistant", &response.content, metadata)
            .await
    }

    async fn persist(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: Option<String>,
    ) -> Result<(), MoanaError> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            metadata,
            created_at: timestamp(),
        };
        self.storage.insert_message(&message).await
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, MoanaError> {
    serde_json::to_string(value).map_err(MoanaError::storage)
}
