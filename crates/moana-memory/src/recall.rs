// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the memory block injected into the system prompt.
//!
//! The three kinds are queried concurrently. A kind that fails is logged and
//! left out; recall as a whole never fails.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use moana_config::model::MemoryConfig;
use moana_core::error::MoanaError;
use tracing::{debug, warn};

use crate::store::MemoryStore;
use crate::types::{
    recent_query, MemoryKind, MemoryRecord, Namespace, Profile, SearchHit, StoredItem, Triple, Turn,
};

/// Limits applied to a single recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecallLimits {
    /// Trailing conversation turns that form the query.
    pub recent_turns: usize,
    pub memories: usize,
    pub triples: usize,
}

impl Default for RecallLimits {
    fn default() -> Self {
        Self {
            recent_turns: 3,
            memories: 3,
            triples: 20,
        }
    }
}

impl From<&MemoryConfig> for RecallLimits {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            recent_turns: config.recall_turns,
            memories: config.memory_limit,
            triples: config.triple_limit,
        }
    }
}

pub struct RecallAssembler {
    store: Arc<dyn MemoryStore>,
    limits: RecallLimits,
}

impl RecallAssembler {
    pub fn new(store: Arc<dyn MemoryStore>, limits: RecallLimits) -> Self {
        Self { store, limits }
    }

    /// Renders what is known about `user_id` that bears on `turns`.
    ///
    /// Returns an empty string when nothing is stored. Blocks appear in the
    /// order profile, memories, knowledge, each on its own lines.
    pub async fn recall(&self, user_id: &str, turns: &[Turn]) -> String {
        let started = Instant::now();
        let query = recent_query(turns, self.limits.recent_turns);
        let query = (!query.is_empty()).then_some(query.as_str());

        let profile_ns = Namespace::new(user_id, MemoryKind::Profile);
        let memories_ns = Namespace::new(user_id, MemoryKind::Memories);
        let triples_ns = Namespace::new(user_id, MemoryKind::Triples);

        let (profile, memories, triples) = tokio::join!(
            self.store.get_all(&profile_ns),
            self.store.search(&memories_ns, query, self.limits.memories),
            self.store.search(&triples_ns, query, self.limits.triples),
        );

        let mut rendered = String::new();
        if let Some(block) = or_skip(&profile_ns, profile).and_then(|items| render_profile(&items)) {
            rendered.push_str(&block);
        }
        if let Some(block) = or_skip(&memories_ns, memories).and_then(|hits| render_memories(&hits)) {
            rendered.push_str(&block);
        }
        if let Some(block) = or_skip(&triples_ns, triples).and_then(|hits| render_knowledge(&hits)) {
            rendered.push_str(&block);
        }

        histogram!("moana_memory_recall_duration_seconds").record(started.elapsed().as_secs_f64());
        debug!(user_id, chars = rendered.len(), "recall assembled");
        rendered
    }
}

fn or_skip<T>(namespace: &Namespace, result: Result<T, MoanaError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            counter!("moana_memory_recall_failures_total", "kind" => namespace.kind.as_str())
                .increment(1);
            warn!(namespace = %namespace, error = %e, "recall skipped a memory kind");
            None
        }
    }
}

fn similarity(score: Option<f32>) -> String {
    score
        .map(|s| format!(" (similarity: {s:.2})"))
        .unwrap_or_default()
}

fn wrap(tag: &str, lines: Vec<String>) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    Some(format!("\n<{tag}>\n{}\n</{tag}>", lines.join("\n")))
}

/// `<profile>` block with one `label: value` line per known field.
pub fn render_profile(items: &[StoredItem]) -> Option<String> {
    let profile: Profile = items
        .iter()
        .find_map(|item| serde_json::from_value(item.value.clone()).ok())?;
    let lines = profile
        .known_fields()
        .into_iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect();
    wrap("profile", lines)
}

/// `<memories>` block: `[key]: content (context: ..; confidence: ..) (similarity: ..)`.
pub fn render_memories(hits: &[SearchHit]) -> Option<String> {
    let lines = hits
        .iter()
        .map(|hit| {
            let body = match serde_json::from_value::<MemoryRecord>(hit.value.clone()) {
                Ok(record) if record.context.trim().is_empty() => {
                    format!("{} (confidence: {})", record.content, record.confidence)
                }
                Ok(record) => format!(
                    "{} (context: {}; confidence: {})",
                    record.content, record.context, record.confidence
                ),
                Err(_) => hit.value.to_string(),
            };
            format!("[{}]: {body}{}", hit.key, similarity(hit.score))
        })
        .collect();
    wrap("memories", lines)
}

/// `<knowledge>` block: `[key]: subject predicate object (similarity: ..)`.
pub fn render_knowledge(hits: &[SearchHit]) -> Option<String> {
    let lines = hits
        .iter()
        .map(|hit| {
            let body = serde_json::from_value::<Triple>(hit.value.clone())
                .map(|t| t.to_string())
                .unwrap_or_else(|_| hit.value.to_string());
            format!("[{}]: {body}{}", hit.key, similarity(hit.score))
        })
        .collect();
    wrap("knowledge", lines)
}
