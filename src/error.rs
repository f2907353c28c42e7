//! Error taxonomy for the pipeline.
//!
//! Every step either returns a well-formed result or fails with one of these
//! kinds; partial success within a batch is not modeled. The orchestrator
//! consults [`RagError::is_transient`] to decide whether a failed step is
//! worth retrying: service and connection failures are, configuration and
//! caller errors are not.

use thiserror::Error;

/// Errors produced by the ingestion and query pipelines and their
/// collaborators.
#[derive(Debug, Error)]
pub enum RagError {
    /// The source document could not be read or parsed. Fatal to the
    /// ingestion invocation that supplied it.
    #[error("failed to load document '{path}': {reason}")]
    DocumentLoad { path: String, reason: String },

    /// The embedding service failed. `transient` is true for network errors,
    /// rate limits (429), and server errors (5xx); false when the service
    /// rejected the request outright.
    #[error("embedding service error: {message}")]
    EmbeddingService { message: String, transient: bool },

    /// The generation service failed. Same transience classification as
    /// [`RagError::EmbeddingService`].
    #[error("generation service error: {message}")]
    GenerationService { message: String, transient: bool },

    /// The vector store could not be reached.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// A vector's dimension does not match the collection's. Configuration
    /// error; must be fixed by an operator, never retried.
    #[error("dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The caller supplied malformed input. Surfaced immediately, never
    /// retried.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A memoized step result could not be serialized or restored.
    #[error("step state error: {0}")]
    State(String),
}

impl RagError {
    /// Whether the orchestrator's step-retry policy should re-run the step.
    pub fn is_transient(&self) -> bool {
        match self {
            RagError::EmbeddingService { transient, .. }
            | RagError::GenerationService { transient, .. } => *transient,
            RagError::StoreUnavailable(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
