// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The extraction oracle: turns a conversation into candidate records.
//!
//! [`ExtractionOracle`] is the seam; [`LlmOracle`] is the production
//! implementation that prompts a model and parses a JSON array out of its
//! reply. Tests substitute a scripted oracle.

use std::sync::Arc;

use async_trait::async_trait;
use moana_core::error::MoanaError;
use moana_core::traits::ProviderAdapter;
use moana_core::types::{ProviderMessage, ProviderRequest};
use serde_json::{json, Value};
use tracing::debug;

use crate::types::{ConversationSnapshot, MemoryKind};

/// Everything the oracle sees for one kind.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub kind: MemoryKind,
    pub instructions: String,
    /// JSON schema each candidate value must satisfy.
    pub schema: Value,
    pub snapshot: ConversationSnapshot,
    /// Current records relevant to the conversation, as `(key, value)`.
    pub existing: Vec<(String, Value)>,
}

/// A proposed record. `key` names an existing record to update; `None` asks
/// for a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: Option<String>,
    pub value: Value,
}

impl Candidate {
    pub fn new(value: Value) -> Self {
        Self { key: None, value }
    }

    pub fn update(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: Some(key.into()),
            value,
        }
    }
}

#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    /// Proposes records for `request.kind`. Malformed model output is an
    /// [`MoanaError::Extraction`].
    async fn extract(&self, request: &ExtractionRequest) -> Result<Vec<Candidate>, MoanaError>;
}

/// Instructions given to the oracle for each kind.
pub fn instructions_for(kind: MemoryKind) -> &'static str {
    match kind {
        MemoryKind::Memories => {
            "Extract user preferences and any other useful information. \
             If a memory conflicts with an existing one, then just update it."
        }
        MemoryKind::Triples => {
            "Extract facts about the user and the people, places and things in their life \
             as subject-predicate-object triples. If a fact contradicts an existing triple, \
             update that triple instead of adding a new one."
        }
        MemoryKind::Profile => {
            "Extract what the conversation reveals about the user's name, age, gender and \
             location. Leave a field out when the conversation says nothing about it."
        }
    }
}

/// JSON schema for the record type of `kind`.
pub fn schema_for(kind: MemoryKind) -> Value {
    match kind {
        MemoryKind::Memories => json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The specific information, preference, or event being remembered."
                },
                "context": {
                    "type": "string",
                    "description": "Additional context about when and how this applies."
                },
                "confidence": {
                    "type": "string",
                    "enum": ["high", "medium", "low"],
                    "description": "How certain the information is."
                }
            },
            "required": ["content"]
        }),
        MemoryKind::Triples => json!({
            "type": "object",
            "properties": {
                "subject": {"type": "string", "description": "The entity the fact is about."},
                "predicate": {"type": "string", "description": "The relationship or attribute."},
                "object": {"type": "string", "description": "The value or related entity."}
            },
            "required": ["subject", "predicate", "object"]
        }),
        MemoryKind::Profile => json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "The user's name."},
                "age": {"type": "integer", "description": "The user's age in years."},
                "gender": {"type": "string", "description": "The user's gender."},
                "location": {"type": "string", "description": "Where the user lives."}
            }
        }),
    }
}

const ORACLE_SYSTEM_PROMPT: &str = "You maintain long-term memory for an assistant. \
You read a conversation and reply with a JSON array only, no explanation.";

/// Builds the user message sent to the extraction model.
pub fn build_prompt(request: &ExtractionRequest) -> String {
    let schema = serde_json::to_string_pretty(&request.schema).unwrap_or_else(|_| request.schema.to_string());
    let existing = if request.existing.is_empty() {
        "(none)".to_string()
    } else {
        request
            .existing
            .iter()
            .map(|(key, value)| format!("[{key}]: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "{instructions}\n\n\
         Each record must match this JSON schema:\n{schema}\n\n\
         Existing records:\n{existing}\n\n\
         Reply with a JSON array of objects shaped like \
         {{\"key\": <existing key or null>, \"value\": <record>}}. \
         Use an existing key to update that record and null to add a new one. \
         Reply with [] when there is nothing worth remembering.\n\n\
         <conversation>\n{conversation}\n</conversation>",
        instructions = request.instructions,
        conversation = request.snapshot.transcript(),
    )
}

/// Pulls candidates out of a model reply.
///
/// Accepts the array anywhere in the text. Elements without a `value`
/// field are taken as bare records.
pub fn parse_candidates(kind: MemoryKind, text: &str) -> Result<Vec<Candidate>, MoanaError> {
    let start = text.find('[');
    let end = text.rfind(']');
    let json_str = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => {
            return Err(MoanaError::extraction(
                kind,
                format!("no JSON array in oracle reply: {}", truncate(text, 200)),
            ));
        }
    };

    let elements: Vec<Value> = serde_json::from_str(json_str)
        .map_err(|e| MoanaError::extraction(kind, format!("malformed oracle reply: {e}")))?;

    Ok(elements
        .into_iter()
        .filter_map(|element| {
            let Value::Object(mut map) = element else {
                return None;
            };
            if !map.contains_key("value") {
                return Some(Candidate::new(Value::Object(map)));
            }
            let key = map
                .get("key")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string);
            map.remove("value").map(|value| Candidate { key, value })
        })
        .collect())
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Oracle backed by a chat model.
pub struct LlmOracle {
    provider: Arc<dyn ProviderAdapter>,
    model: String,
    max_tokens: u32,
}

impl LlmOracle {
    /// `model` is the bare model name, without a provider prefix.
    pub fn new(provider: Arc<dyn ProviderAdapter>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 2048,
        }
    }
}

#[async_trait]
impl ExtractionOracle for LlmOracle {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Vec<Candidate>, MoanaError> {
        let provider_request = ProviderRequest {
            model: self.model.clone(),
            system_prompt: Some(ORACLE_SYSTEM_PROMPT.to_string()),
            messages: vec![ProviderMessage::text("user", build_prompt(request))],
            max_tokens: self.max_tokens,
            tools: None,
        };

        let response = self
            .provider
            .complete(provider_request)
            .await
            .map_err(|e| MoanaError::extraction(request.kind, format!("oracle call failed: {e}")))?;
        debug!(
            kind = %request.kind,
            output_tokens = response.usage.output_tokens,
            "oracle replied"
        );
        parse_candidates(request.kind, &response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, Turn};

    #[test]
    fn parses_wrapped_and_bare_candidates() {
        let reply = r#"Here you go:
[
  {"key": "abc", "value": {"content": "likes coffee"}},
  {"key": null, "value": {"content": "lives in Lisbon"}},
  {"content": "bare record"},
  "ignored"
]"#;
        let candidates = parse_candidates(MemoryKind::Memories, reply).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].key.as_deref(), Some("abc"));
        assert_eq!(candidates[1].key, None);
        assert_eq!(candidates[2].value, json!({"content": "bare record"}));
    }

    #[test]
    fn empty_array_means_nothing_to_remember() {
        assert!(parse_candidates(MemoryKind::Triples, "[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_reply_is_an_extraction_error() {
        let err = parse_candidates(MemoryKind::Profile, "I could not find anything").unwrap_err();
        assert!(matches!(err, MoanaError::Extraction { ref kind, .. } if kind == "profile"));

        let err = parse_candidates(MemoryKind::Profile, "[{\"name\": }]").unwrap_err();
        assert!(err.to_string().contains("malformed"), "got: {err}");
    }

    #[test]
    fn prompt_carries_schema_existing_records_and_transcript() {
        let request = ExtractionRequest {
            kind: MemoryKind::Memories,
            instructions: instructions_for(MemoryKind::Memories).to_string(),
            schema: schema_for(MemoryKind::Memories),
            snapshot: ConversationSnapshot::new(
                "alice",
                vec![Turn::new(Role::User, "I switched to coffee")],
            ),
            existing: vec![("k1".into(), json!({"content": "likes tea"}))],
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("just update it"));
        assert!(prompt.contains("\"confidence\""));
        assert!(prompt.contains("[k1]: {\"content\":\"likes tea\"}"));
        assert!(prompt.contains("user: I switched to coffee"));
    }

    #[test]
    fn every_kind_has_an_object_schema() {
        for kind in MemoryKind::ALL {
            assert_eq!(schema_for(kind)["type"], "object");
            assert!(!instructions_for(kind).is_empty());
        }
    }
}
