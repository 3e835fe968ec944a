// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt loading and transcript conversion.
//!
//! The checkpointer stores one row per message. Assistant rows carry any
//! tool calls as JSON in `metadata`, and tool results are stored with role
//! `tool` and `{tool_use_id, is_error}` metadata. This module turns those
//! rows back into provider messages and memory turns.

use chrono::{SecondsFormat, Utc};
use moana_config::model::AgentConfig;
use moana_core::types::{ContentBlock, Message, ProviderMessage, ToolUseData};
use moana_memory::{Role, Turn};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Loads the system prompt template: file > inline > default.
pub async fn load_system_prompt(config: &AgentConfig) -> String {
    if let Some(ref path) = config.system_prompt_file {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    info!(path = path.as_str(), "loaded system prompt from file");
                    return trimmed.to_string();
                }
            }
            Err(e) => {
                warn!(
                    path = path.as_str(),
                    error = %e,
                    "failed to read system prompt file, falling back"
                );
            }
        }
    }

    if !config.system_prompt.trim().is_empty() {
        return config.system_prompt.clone();
    }
    moana_config::model::DEFAULT_SYSTEM_PROMPT.to_string()
}

/// Substitutes `{system_time}` and `{user_info}` in a prompt template.
pub fn render_system_prompt(template: &str, user_info: &str) -> String {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    template
        .replace("{system_time}", &now)
        .replace("{user_info}", user_info)
}

/// Metadata attached to a persisted tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ToolResultMeta {
    pub tool_use_id: String,
    #[serde(default)]
    pub is_error: bool,
}

/// Metadata attached to an assistant message that requested tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct AssistantMeta {
    #[serde(default)]
    pub tool_uses: Vec<ToolUseData>,
}

fn assistant_tool_uses(message: &Message) -> Vec<ToolUseData> {
    message
        .metadata
        .as_deref()
        .and_then(|raw| serde_json::from_str::<AssistantMeta>(raw).ok())
        .map(|meta| meta.tool_uses)
        .unwrap_or_default()
}

/// Converts checkpointed rows into provider messages.
///
/// Consecutive tool results are grouped into a single `user` message, the
/// shape the Messages API expects after an assistant `tool_use` turn.
pub fn to_provider_messages(history: &[Message]) -> Vec<ProviderMessage> {
    let mut messages: Vec<ProviderMessage> = Vec::with_capacity(history.len());

    for row in history {
        match row.role.as_str() {
            "tool" => {
                let Some(meta) = row
                    .metadata
                    .as_deref()
                    .and_then(|raw| serde_json::from_str::<ToolResultMeta>(raw).ok())
                else {
                    warn!(message_id = %row.id, "tool result without metadata, skipping");
                    continue;
                };
                let block = ContentBlock::ToolResult {
                    tool_use_id: meta.tool_use_id,
                    content: row.content.clone(),
                    is_error: meta.is_error.then_some(true),
                };
                match messages.last_mut() {
                    Some(last)
                        if last.role == "user"
                            && last
                                .content
                                .iter()
                                .all(|b| matches!(b, ContentBlock::ToolResult { .. })) =>
                    {
                        last.content.push(block);
                    }
                    _ => messages.push(ProviderMessage {
                        role: "user".to_string(),
                        content: vec![block],
                    }),
                }
            }
            "assistant" => {
                let mut content = Vec::new();
                if !row.content.is_empty() {
                    content.push(ContentBlock::Text {
                        text: row.content.clone(),
                    });
                }
                for tool_use in assistant_tool_uses(row) {
                    content.push(ContentBlock::ToolUse {
                        id: tool_use.id,
                        name: tool_use.name,
                        input: tool_use.input,
                    });
                }
                if !content.is_empty() {
                    messages.push(ProviderMessage {
                        role: "assistant".to_string(),
                        content,
                    });
                }
            }
            "user" => {
                if !row.content.is_empty() {
                    messages.push(ProviderMessage::text("user", row.content.clone()));
                }
            }
            other => warn!(role = other, "unexpected role in transcript, skipping"),
        }
    }
    messages
}

/// Converts checkpointed rows into memory turns.
pub fn to_turns(history: &[Message]) -> Vec<Turn> {
    history
        .iter()
        .filter_map(|row| {
            let role = row.role.parse::<Role>().ok()?;
            Some(Turn::new(role, row.content.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(role: &str, content: &str, metadata: Option<String>) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: "s".into(),
            role: role.into(),
            content: content.into(),
            metadata,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn render_fills_both_placeholders() {
        let out = render_system_prompt(
            moana_config::model::DEFAULT_SYSTEM_PROMPT,
            "\n<profile>\nname: Alice\n</profile>",
        );
        assert!(out.starts_with("You are a helpful AI assistant.\n<profile>"));
        assert!(!out.contains("{system_time}"));
        assert!(out.contains("System time: 20"));
    }

    #[test]
    fn render_with_empty_recall_leaves_no_placeholder() {
        let out = render_system_prompt("Hi.{user_info}", "");
        assert_eq!(out, "Hi.");
    }

    #[tokio::test]
    async fn prompt_file_wins_over_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "  From file {user_info}\n").unwrap();

        let config = AgentConfig {
            system_prompt: "inline".into(),
            system_prompt_file: Some(path.to_string_lossy().into_owned()),
            ..AgentConfig::default()
        };
        assert_eq!(load_system_prompt(&config).await, "From file {user_info}");
    }

    #[tokio::test]
    async fn missing_prompt_file_falls_back_to_inline() {
        let config = AgentConfig {
            system_prompt: "inline".into(),
            system_prompt_file: Some("/definitely/not/here.txt".into()),
            ..AgentConfig::default()
        };
        assert_eq!(load_system_prompt(&config).await, "inline");
    }

    #[test]
    fn tool_rounds_are_rebuilt() {
        let uses = AssistantMeta {
            tool_uses: vec![
                ToolUseData {
                    id: "t1".into(),
                    name: "search_memory".into(),
                    input: json!({"query": "tea"}),
                },
                ToolUseData {
                    id: "t2".into(),
                    name: "search_memory".into(),
                    input: json!({"query": "coffee"}),
                },
            ],
        };
        let result = |id: &str| {
            Some(
                serde_json::to_string(&ToolResultMeta {
                    tool_use_id: id.into(),
                    is_error: false,
                })
                .unwrap(),
            )
        };
        let history = vec![
            row("user", "what do I drink?", None),
            row("assistant", "", Some(serde_json::to_string(&uses).unwrap())),
            row("tool", "No memories found.", result("t1")),
            row("tool", "[k]: likes coffee", result("t2")),
            row("assistant", "Coffee.", None),
        ];

        let messages = to_provider_messages(&history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].content.len(), 2);
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages[2].content.len(), 2);
        assert!(matches!(
            &messages[2].content[1],
            ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "t2"
        ));
        assert_eq!(messages[3], ProviderMessage::text("assistant", "Coffee."));
    }

    #[test]
    fn turns_keep_roles() {
        let history = vec![row("user", "hi", None), row("assistant", "hello", None)];
        let turns = to_turns(&history);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].content, "hello");
    }
}
