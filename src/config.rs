use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Backend: `qdrant` (REST) or `memory` (in-process, volatile).
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Vector dimensionality; must match the embedding model's output.
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: default_store_url(),
            collection: default_collection(),
            dims: default_dims(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_store_backend() -> String {
    "qdrant".to_string()
}
fn default_store_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "docs".to_string()
}
fn default_dims() -> usize {
    3072
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size in characters.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            overlap: default_overlap(),
        }
    }
}

fn default_window() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_openai_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Low by default — answers should lean deterministic.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            base_url: default_openai_base_url(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_output_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.1
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// When set, a query that retrieves zero contexts returns this answer
    /// without calling the generator. Unset = always call the generator,
    /// even with an empty context block.
    #[serde(default)]
    pub no_context_answer: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            no_context_answer: None,
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestratorConfig {
    /// Total attempts per step for transient failures.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds; doubles per retry, capped.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}
fn default_base_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.window == 0 {
        anyhow::bail!("chunking.window must be > 0");
    }
    if config.chunking.overlap >= config.chunking.window {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.window ({})",
            config.chunking.overlap,
            config.chunking.window
        );
    }
    if config.store.dims == 0 {
        anyhow::bail!("store.dims must be > 0");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.orchestrator.max_attempts == 0 {
        anyhow::bail!("orchestrator.max_attempts must be >= 1");
    }

    match config.store.backend.as_str() {
        "qdrant" | "memory" => {}
        other => anyhow::bail!(
            "Unknown store backend: '{}'. Must be qdrant or memory.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_from_str(toml_text: &str) -> Result<Config> {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(toml_text.as_bytes()).unwrap();
        load_config(f.path())
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config.store.backend, "qdrant");
        assert_eq!(config.store.dims, 3072);
        assert_eq!(config.chunking.window, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.top_k, 5);
        assert!(config.retrieval.no_context_answer.is_none());
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let err = load_from_str("[chunking]\nwindow = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn unknown_backend_rejected() {
        let err = load_from_str("[store]\nbackend = \"postgres\"\n").unwrap_err();
        assert!(err.to_string().contains("store backend"));
    }

    #[test]
    fn no_context_policy_parses() {
        let config =
            load_from_str("[retrieval]\nno_context_answer = \"No information found.\"\n").unwrap();
        assert_eq!(
            config.retrieval.no_context_answer.as_deref(),
            Some("No information found.")
        );
    }
}
