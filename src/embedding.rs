//! Embedding service boundary.
//!
//! Defines the [`Embedder`] trait and the OpenAI-compatible implementation.
//! A call embeds a whole batch in one round trip and returns one vector per
//! input, in input order, all of the model's fixed dimension.
//!
//! Retry policy lives with the caller (the orchestrator's step runner), not
//! here; this module only classifies failures as transient or not:
//! HTTP 429 / 5xx / network errors are transient, other 4xx are not.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// A service that turns a batch of texts into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The embedding vector dimensionality (e.g. `3072`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts: one vector per input, same order, all of
    /// [`dims`](Embedder::dims) length. An empty batch returns an empty
    /// vec without a network call.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedder backed by an OpenAI-compatible `POST /embeddings` endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, dims: usize) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::InvalidParameter("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::EmbeddingService {
                message: format!("failed to build HTTP client: {}", e),
                transient: false,
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingService {
                message: e.to_string(),
                transient: true,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let transient = status.as_u16() == 429 || status.is_server_error();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingService {
                message: format!("HTTP {}: {}", status, body_text),
                transient,
            });
        }

        let json: serde_json::Value =
            resp.json().await.map_err(|e| RagError::EmbeddingService {
                message: format!("invalid response body: {}", e),
                transient: false,
            })?;

        let vectors = parse_embedding_response(&json)?;

        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingService {
                message: format!(
                    "response cardinality mismatch: sent {} texts, got {} vectors",
                    texts.len(),
                    vectors.len()
                ),
                transient: false,
            });
        }
        for v in &vectors {
            if v.len() != self.dims {
                return Err(RagError::DimensionMismatch {
                    expected: self.dims,
                    actual: v.len(),
                });
            }
        }

        Ok(vectors)
    }
}

/// Extract the `data[].embedding` arrays, re-ordered by the `index` field so
/// the output always matches input order.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RagError::EmbeddingService {
            message: "invalid response: missing data array".to_string(),
            transient: false,
        })?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| RagError::EmbeddingService {
                message: "invalid response: missing embedding".to_string(),
                transient: false,
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);

        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Cosine similarity between two vectors; `0.0` for empty or
/// mismatched-length inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
