//! Process-wide service handles.
//!
//! The embedding client, generation client, and vector store are constructed
//! once at startup and passed explicitly into the pipelines: init on
//! startup, reused across requests, no teardown required. Tests inject
//! their own implementations of the three traits.

use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::error::Result;
use crate::generation::{Generator, OpenAiGenerator};
use crate::store::{create_store, VectorStore};

/// Shared handles to the pipeline's external collaborators.
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub store: Arc<dyn VectorStore>,
}

impl Services {
    /// Build the production service set from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            embedder: Arc::new(OpenAiEmbedder::new(&config.embedding, config.store.dims)?),
            generator: Arc::new(OpenAiGenerator::new(&config.generation)?),
            store: Arc::from(create_store(&config.store)?),
        })
    }

    /// Assemble a service set from explicit parts. Used by tests and by
    /// embedders/stores not constructed from configuration.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
        }
    }
}
