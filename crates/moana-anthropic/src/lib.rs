// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for Moana.
//!
//! Implements [`ProviderAdapter`] over the Messages API, including tool use.

pub mod client;
pub mod types;

use async_trait::async_trait;
use moana_config::MoanaConfig;
use moana_core::error::MoanaError;
use moana_core::traits::{PluginAdapter, ProviderAdapter};
use moana_core::types::{
    AdapterType, ContentBlock, HealthStatus, ProviderRequest, ProviderResponse, TokenUsage,
    ToolUseData,
};
use tracing::{debug, info, warn};

use crate::client::AnthropicClient;
use crate::types::{
    ApiContent, ApiContentBlock, ApiMessage, MessageRequest, ResponseContentBlock, ToolDefinition,
};

/// Anthropic provider.
///
/// The API key comes from `anthropic.api_key`, falling back to the
/// `ANTHROPIC_API_KEY` environment variable.
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    pub fn new(config: &MoanaConfig) -> Result<Self, MoanaError> {
        let api_key = resolve_api_key(config.anthropic.api_key.as_deref())?;
        let client = AnthropicClient::new(&api_key, &config.anthropic.api_version)?;
        info!(api_version = %config.anthropic.api_version, "Anthropic provider initialized");
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }

    fn to_message_request(request: &ProviderRequest) -> MessageRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.clone(),
                content: convert_content_blocks(&m.content),
            })
            .collect();

        let tools = request
            .tools
            .as_ref()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| match serde_json::from_value::<ToolDefinition>(v.clone()) {
                        Ok(tool) => Some(tool),
                        Err(e) => {
                            warn!(error = %e, "dropping malformed tool definition");
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|tools| !tools.is_empty());

        MessageRequest {
            model: request.model.clone(),
            messages,
            system: request.system_prompt.clone().filter(|s| !s.is_empty()),
            max_tokens: request.max_tokens,
            tools,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
        debug!("Anthropic provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, MoanaError> {
        let api_request = Self::to_message_request(&request);
        let response = self.client.complete_message(&api_request).await?;

        let mut text = Vec::new();
        let mut tool_uses = Vec::new();
        for block in response.content {
            match block {
                ResponseContentBlock::Text { text: t } => text.push(t),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_uses.push(ToolUseData { id, name, input })
                }
                ResponseContentBlock::Other => {}
            }
        }

        Ok(ProviderResponse {
            id: response.id,
            content: text.join(""),
            tool_uses,
            model: response.model,
            stop_reason: response.stop_reason,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, MoanaError> {
    match config_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => Ok(key.to_string()),
        None => std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            MoanaError::Config(
                "Anthropic API key not found. Set anthropic.api_key in config or the ANTHROPIC_API_KEY environment variable.".into(),
            )
        }),
    }
}

/// A lone text block goes out as a plain string.
fn convert_content_blocks(blocks: &[ContentBlock]) -> ApiContent {
    if let [ContentBlock::Text { text }] = blocks {
        return ApiContent::Text(text.clone());
    }

    ApiContent::Blocks(
        blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => ApiContentBlock::Text { text: text.clone() },
                ContentBlock::ToolUse { id, name, input } => ApiContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                },
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => ApiContentBlock::ToolResult {
                    tool_use_id: tool_use_id.clone(),
                    content: content.clone(),
                    is_error: *is_error,
                },
            })
            .collect(),
    )
}
