// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapters used by the memory stores.
//!
//! [`OpenAiEmbedder`] calls the OpenAI embeddings endpoint. [`LocalEmbedder`]
//! hashes words into a fixed-size vector and needs no network, which makes it
//! the choice for offline use and for tests.

use std::time::Duration;

use async_trait::async_trait;
use moana_core::error::MoanaError;
use moana_core::traits::adapter::PluginAdapter;
use moana_core::traits::embedding::EmbeddingAdapter;
use moana_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Feature-hashing embedder: each word and word pair lands in a signed bucket.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embeds a single text. Texts without words map to the zero vector.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        for word in &words {
            self.accumulate(&mut vector, word.as_bytes(), 1.0);
        }
        for pair in words.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, joined.as_bytes(), 0.5);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], token: &[u8], weight: f32) {
        let hash = fnv1a(token);
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl PluginAdapter for LocalEmbedder {
    fn name(&self) -> &str {
        "local-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MoanaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MoanaError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for LocalEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MoanaError> {
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.embed_text(t)).collect(),
            dimensions: self.dimensions,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for the OpenAI `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    model: String,
    dimensions: usize,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, model: String, dimensions: usize) -> Result<Self, MoanaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| MoanaError::Config(format!("invalid embedding API key: {e}")))?,
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MoanaError::Provider {
                message: format!("failed to build embedding HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model,
            dimensions,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Points the client at an OpenAI-compatible server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PluginAdapter for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MoanaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MoanaError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MoanaError> {
        if input.texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
                dimensions: self.dimensions,
            });
        }

        let body = EmbeddingRequest {
            model: &self.model,
            input: &input.texts,
            dimensions: self.dimensions,
        };
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| MoanaError::Provider {
                message: format!("embedding request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, count = input.texts.len(), "embedding response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MoanaError::Provider {
                message: format!("embedding API returned {status}: {body}"),
                source: None,
            });
        }

        let mut parsed: EmbeddingResponse =
            response.json().await.map_err(|e| MoanaError::Provider {
                message: format!("failed to parse embedding response: {e}"),
                source: Some(Box::new(e)),
            })?;
        if parsed.data.len() != input.texts.len() {
            return Err(MoanaError::Provider {
                message: format!(
                    "embedding API returned {} vectors for {} inputs",
                    parsed.data.len(),
                    input.texts.len()
                ),
                source: None,
            });
        }
        parsed.data.sort_by_key(|d| d.index);

        Ok(EmbeddingOutput {
            embeddings: parsed.data.into_iter().map(|d| d.embedding).collect(),
            dimensions: self.dimensions,
        })
    }
}

/// Embeds one text through any adapter.
pub(crate) async fn embed_one(
    embedder: &dyn EmbeddingAdapter,
    text: &str,
) -> Result<Vec<f32>, MoanaError> {
    let output = embedder
        .embed(EmbeddingInput {
            texts: vec![text.to_string()],
        })
        .await?;
    output
        .embeddings
        .into_iter()
        .next()
        .ok_or_else(|| MoanaError::Provider {
            message: "embedding adapter returned no vectors".into(),
            source: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cosine_similarity;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn local_embeddings_are_normalized_and_deterministic() {
        let embedder = LocalEmbedder::new(64);
        let a = embedder.embed_text("The user likes green tea");
        let b = embedder.embed_text("the user LIKES green tea!");
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(a, b);
    }

    #[test]
    fn local_embeddings_rank_overlapping_text_higher() {
        let embedder = LocalEmbedder::new(256);
        let query = embedder.embed_text("what tea does the user drink");
        let tea = embedder.embed_text("user drinks green tea");
        let car = embedder.embed_text("owns a red bicycle");
        assert!(cosine_similarity(&query, &tea) > cosine_similarity(&query, &car));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = LocalEmbedder::new(8);
        assert!(embedder.embed_text("  ...  ").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn openai_embedder_orders_vectors_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "dimensions": 2
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new("sk-test", "text-embedding-3-small".into(), 2)
            .unwrap()
            .with_base_url(server.uri());
        let output = embedder
            .embed(EmbeddingInput {
                texts: vec!["first".into(), "second".into()],
            })
            .await
            .unwrap();
        assert_eq!(output.embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn openai_embedder_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new("sk-bad", "m".into(), 2)
            .unwrap()
            .with_base_url(server.uri());
        let err = embed_one(&embedder, "hello").await.unwrap_err();
        assert!(err.to_string().contains("401"), "got: {err}");
    }
}
