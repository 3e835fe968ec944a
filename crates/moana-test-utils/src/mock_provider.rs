// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with pre-configured responses
//! and records every request it receives.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use moana_core::traits::adapter::PluginAdapter;
use moana_core::traits::provider::ProviderAdapter;
use moana_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderResponse, TokenUsage, ToolUseData,
};
use moana_core::MoanaError;

/// Builds a plain text reply.
pub fn text_response(text: impl Into<String>) -> ProviderResponse {
    ProviderResponse {
        id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
        content: text.into(),
        tool_uses: Vec::new(),
        model: "mock-model".to_string(),
        stop_reason: Some("end_turn".to_string()),
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 20,
        },
    }
}

/// Builds a reply that asks for a single tool call.
pub fn tool_use_response(
    id: impl Into<String>,
    name: impl Into<String>,
    input: serde_json::Value,
) -> ProviderResponse {
    ProviderResponse {
        tool_uses: vec![ToolUseData {
            id: id.into(),
            name: name.into(),
            input,
        }],
        stop_reason: Some("tool_use".to_string()),
        ..text_response("")
    }
}

/// A mock LLM provider that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty,
/// a default "mock response" text is returned.
pub struct MockProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
    failing: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            requests: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    /// A provider whose every call fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub async fn push(&self, response: ProviderResponse) {
        self.responses.lock().await.push_back(response);
    }

    pub async fn push_text(&self, text: impl Into<String>) {
        self.push(text_response(text)).await;
    }

    /// Every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    /// System prompt of the most recent request.
    pub async fn last_system_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .await
            .last()
            .and_then(|r| r.system_prompt.clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, MoanaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MoanaError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, MoanaError> {
        let model = request.model.clone();
        self.requests.lock().await.push(request);
        if self.failing {
            return Err(MoanaError::Provider {
                message: "mock provider failure".to_string(),
                source: None,
            });
        }
        let mut response = self
            .responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| text_response("mock response"));
        response.model = model;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "test-model".to_string(),
            system_prompt: Some("sys".to_string()),
            messages: vec![],
            max_tokens: 100,
            tools: None,
        }
    }

    #[tokio::test]
    async fn default_response_when_queue_empty() {
        let provider = MockProvider::new();
        let resp = provider.complete(request()).await.unwrap();
        assert_eq!(resp.content, "mock response");
        assert_eq!(resp.model, "test-model");
    }

    #[tokio::test]
    async fn queued_responses_returned_in_order() {
        let provider = MockProvider::with_responses(vec![
            tool_use_response("t1", "search_memory", serde_json::json!({"query": "x"})),
            text_response("done"),
        ]);
        assert!(provider.complete(request()).await.unwrap().wants_tools());
        assert_eq!(provider.complete(request()).await.unwrap().content, "done");
        assert_eq!(provider.requests().await.len(), 2);
        assert_eq!(provider.last_system_prompt().await.as_deref(), Some("sys"));
    }

    #[tokio::test]
    async fn failing_provider_still_records() {
        let provider = MockProvider::failing();
        assert!(provider.complete(request()).await.is_err());
        assert_eq!(provider.requests().await.len(), 1);
    }
}
