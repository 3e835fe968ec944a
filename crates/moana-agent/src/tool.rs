// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and registry.
//!
//! The registry hands the provider Anthropic-format tool definitions and
//! resolves `tool_use` blocks back to implementations.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use moana_core::MoanaError;
use serde::{Deserialize, Serialize};

/// Result of one tool invocation, sent back as a `tool_result` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// A failure the model should see and can recover from.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool input.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Runs the tool. Invalid input should come back as [`ToolOutput::error`];
    /// `Err` is for infrastructure failures.
    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, MoanaError>;
}

/// Tools by name, iterated in name order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool`, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// `{name, description, input_schema}` objects for the provider request.
    pub fn tool_definitions(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "input_schema": t.parameters_schema(),
                })
            })
            .collect()
    }

    /// Looks up and runs a tool, folding every failure into an error output.
    pub async fn dispatch(&self, name: &str, input: serde_json::Value) -> ToolOutput {
        let Some(tool) = self.get(name) else {
            return ToolOutput::error(format!("unknown tool: {name}"));
        };
        match tool.invoke(input).await {
            Ok(output) => output,
            Err(e) => ToolOutput::error(format!("{name} failed: {e}")),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input back"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            })
        }

        async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, MoanaError> {
            match input["message"].as_str() {
                Some(m) => Ok(ToolOutput::ok(m)),
                None => Err(MoanaError::Tool {
                    message: "message missing".into(),
                    source: None,
                }),
            }
        }
    }

    #[test]
    fn definitions_use_anthropic_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let defs = registry.tool_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["name"], "echo");
        assert_eq!(defs[0]["input_schema"]["required"][0], "message");
    }

    #[tokio::test]
    async fn dispatch_folds_failures_into_error_output() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let ok = registry.dispatch("echo", serde_json::json!({"message": "hi"})).await;
        assert_eq!(ok, ToolOutput::ok("hi"));

        let failed = registry.dispatch("echo", serde_json::json!({})).await;
        assert!(failed.is_error);
        assert!(failed.content.contains("message missing"));

        let unknown = registry.dispatch("nope", serde_json::json!({})).await;
        assert!(unknown.is_error);
        assert_eq!(unknown.content, "unknown tool: nope");
    }
}
