//! Generation service boundary.
//!
//! The query pipeline hands the generator a fixed system instruction plus an
//! assembled user prompt and gets back a single answer string. Output length
//! is bounded and the sampling temperature is low so answers lean
//! deterministic. Failure classification mirrors the embedding client:
//! 429 / 5xx / network errors are transient, other 4xx are not.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};

/// A service that composes an answer from a system instruction and a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Generator backed by an OpenAI-compatible `POST /chat/completions`
/// endpoint. Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::InvalidParameter("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::GenerationService {
                message: format!("failed to build HTTP client: {}", e),
                transient: false,
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": self.max_output_tokens,
            "temperature": self.temperature,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::GenerationService {
                message: e.to_string(),
                transient: true,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let transient = status.as_u16() == 429 || status.is_server_error();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(RagError::GenerationService {
                message: format!("HTTP {}: {}", status, body_text),
                transient,
            });
        }

        let json: serde_json::Value =
            resp.json().await.map_err(|e| RagError::GenerationService {
                message: format!("invalid response body: {}", e),
                transient: false,
            })?;

        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`, trimmed of surrounding whitespace.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| RagError::GenerationService {
            message: "invalid response: missing choices[0].message.content".to_string(),
            transient: false,
        })
}
