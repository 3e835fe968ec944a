// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools that let the model read and write the user's free-text memories.

use std::sync::Arc;

use async_trait::async_trait;
use moana_core::MoanaError;
use moana_memory::types::Confidence;
use moana_memory::{MemoryKind, MemoryRecord, MemoryStore, Namespace};
use serde::Deserialize;
use tracing::debug;

use crate::tool::{Tool, ToolOutput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Action {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Deserialize)]
struct ManageInput {
    action: Action,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

/// Creates, updates and deletes records in `(user, memories)`.
pub struct ManageMemoryTool {
    store: Arc<dyn MemoryStore>,
    namespace: Namespace,
}

impl ManageMemoryTool {
    pub fn new(store: Arc<dyn MemoryStore>, user_id: &str) -> Self {
        Self {
            store,
            namespace: Namespace::new(user_id, MemoryKind::Memories),
        }
    }

    fn record(content: String, context: Option<String>) -> Result<serde_json::Value, MoanaError> {
        serde_json::to_value(MemoryRecord {
            content,
            context: context.unwrap_or_default(),
            confidence: Confidence::High,
        })
        .map_err(|e| MoanaError::Tool {
            message: "could not encode memory".into(),
            source: Some(Box::new(e)),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[async_trait]
impl Tool for ManageMemoryTool {
    fn name(&self) -> &str {
        "manage_memory"
    }

    fn description(&self) -> &str {
        "Create, update, or delete a long-term memory about the user. \
         Use it to remember preferences, facts and events worth keeping across conversations."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["create", "update", "delete"]},
                "content": {"type": "string", "description": "The information to remember."},
                "context": {"type": "string", "description": "When and how the memory applies."},
                "id": {"type": "string", "description": "Key of the memory to update or delete."}
            },
            "required": ["action"]
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, MoanaError> {
        let input: ManageInput = match serde_json::from_value(input) {
            Ok(input) => input,
            Err(e) => return Ok(ToolOutput::error(format!("invalid input: {e}"))),
        };
        let id = non_empty(input.id);
        let content = non_empty(input.content);

        match input.action {
            Action::Create => {
                let Some(content) = content else {
                    return Ok(ToolOutput::error("create requires content"));
                };
                let key = uuid::Uuid::new_v4().to_string();
                self.store
                    .put(&self.namespace, &key, Self::record(content, input.context)?)
                    .await?;
                debug!(namespace = %self.namespace, key = %key, "memory created by tool");
                Ok(ToolOutput::ok(format!("created memory {key}")))
            }
            Action::Update => {
                let (Some(key), Some(content)) = (id, content) else {
                    return Ok(ToolOutput::error("update requires id and content"));
                };
                if self.store.get(&self.namespace, &key).await?.is_none() {
                    return Ok(ToolOutput::error(format!("no memory with id {key}")));
                }
                self.store
                    .put(&self.namespace, &key, Self::record(content, input.context)?)
                    .await?;
                Ok(ToolOutput::ok(format!("updated memory {key}")))
            }
            Action::Delete => {
                let Some(key) = id else {
                    return Ok(ToolOutput::error("delete requires id"));
                };
                if self.store.delete(&self.namespace, &key).await? {
                    Ok(ToolOutput::ok(format!("deleted memory {key}")))
                } else {
                    Ok(ToolOutput::error(format!("no memory with id {key}")))
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// Similarity search over `(user, memories)`.
pub struct SearchMemoryTool {
    store: Arc<dyn MemoryStore>,
    namespace: Namespace,
    max_results: usize,
}

impl SearchMemoryTool {
    pub fn new(store: Arc<dyn MemoryStore>, user_id: &str, max_results: usize) -> Self {
        Self {
            store,
            namespace: Namespace::new(user_id, MemoryKind::Memories),
            max_results: max_results.max(1),
        }
    }
}

#[async_trait]
impl Tool for SearchMemoryTool {
    fn name(&self) -> &str {
        "search_memory"
    }

    fn description(&self) -> &str {
        "Search the user's long-term memories for information relevant to a query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "What to look for."},
                "limit": {"type": "integer", "minimum": 1, "description": "Maximum results."}
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, MoanaError> {
        let input: SearchInput = match serde_json::from_value(input) {
            Ok(input) => input,
            Err(e) => return Ok(ToolOutput::error(format!("invalid input: {e}"))),
        };
        let limit = input.limit.unwrap_or(self.max_results).clamp(1, self.max_results);
        let hits = self
            .store
            .search(&self.namespace, Some(&input.query), limit)
            .await?;
        if hits.is_empty() {
            return Ok(ToolOutput::ok("No memories found."));
        }

        let lines: Vec<String> = hits
            .iter()
            .map(|hit| {
                let content = hit.value["content"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| hit.value.to_string());
                match hit.score {
                    Some(score) => format!("[{}]: {content} (similarity: {score:.2})", hit.key),
                    None => format!("[{}]: {content}", hit.key),
                }
            })
            .collect();
        Ok(ToolOutput::ok(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moana_memory::{InMemoryStore, LocalEmbedder};
    use serde_json::json;

    fn store() -> Arc<dyn MemoryStore> {
        Arc::new(InMemoryStore::new(Arc::new(LocalEmbedder::new(128))))
    }

    fn created_key(output: &ToolOutput) -> String {
        output
            .content
            .strip_prefix("created memory ")
            .expect("create output")
            .to_string()
    }

    #[tokio::test]
    async fn create_update_delete_cycle() {
        let store = store();
        let tool = ManageMemoryTool::new(Arc::clone(&store), "alice");
        let ns = Namespace::new("alice", MemoryKind::Memories);

        let created = tool
            .invoke(json!({"action": "create", "content": "likes tea", "context": "mornings"}))
            .await
            .unwrap();
        assert!(!created.is_error);
        let key = created_key(&created);
        assert_eq!(store.get(&ns, &key).await.unwrap().unwrap().value["confidence"], "high");

        let updated = tool
            .invoke(json!({"action": "update", "id": key, "content": "likes coffee"}))
            .await
            .unwrap();
        assert_eq!(updated.content, format!("updated memory {key}"));
        assert_eq!(store.get(&ns, &key).await.unwrap().unwrap().value["content"], "likes coffee");

        let deleted = tool.invoke(json!({"action": "delete", "id": key})).await.unwrap();
        assert!(!deleted.is_error);
        assert!(store.get_all(&ns).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_requests_become_error_outputs() {
        let tool = ManageMemoryTool::new(store(), "alice");
        for input in [
            json!({"action": "create"}),
            json!({"action": "update", "content": "x"}),
            json!({"action": "update", "id": "missing", "content": "x"}),
            json!({"action": "delete", "id": "missing"}),
            json!({"action": "explode"}),
        ] {
            let output = tool.invoke(input.clone()).await.unwrap();
            assert!(output.is_error, "{input} should fail");
        }
    }

    #[tokio::test]
    async fn search_is_scoped_to_the_user() {
        let store = store();
        ManageMemoryTool::new(Arc::clone(&store), "alice")
            .invoke(json!({"action": "create", "content": "plays the cello"}))
            .await
            .unwrap();

        let alice = SearchMemoryTool::new(Arc::clone(&store), "alice", 10);
        let bob = SearchMemoryTool::new(store, "bob", 10);

        let found = alice.invoke(json!({"query": "cello"})).await.unwrap();
        assert!(found.content.contains("plays the cello (similarity: "), "{}", found.content);
        let nothing = bob.invoke(json!({"query": "cello"})).await.unwrap();
        assert_eq!(nothing.content, "No memories found.");
    }
}
