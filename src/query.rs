//! Query pipeline: `Received → Retrieved → Answered`.
//!
//! Three steps, each memoized by the step runner:
//!
//! 1. `embed-and-search` — embed the question (a single-element batch) and
//!    pull the `top_k` nearest chunks from the store.
//! 2. `assemble-prompt` — join the retrieved contexts into one block and
//!    wrap it with the question.
//! 3. `generate` — hand the prompt to the generation service under a fixed
//!    system instruction.
//!
//! When retrieval comes back empty the generator is still invoked with an
//! empty context block, unless `retrieval.no_context_answer` is configured,
//! in which case the pipeline short-circuits with that fixed answer.

use tracing::info;

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::models::{QueryAnswer, QueryEvent, Retrieved};
use crate::orchestrator::PipelineRun;
use crate::services::Services;

/// Instruction sent with every generation call.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant that answers questions strictly from the provided context.";

/// Delimiter between retrieved contexts in the prompt's context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Run the query pipeline for one question.
pub async fn run_query(
    services: &Services,
    config: &Config,
    run: &PipelineRun,
    event: &QueryEvent,
) -> Result<QueryAnswer> {
    if event.question.trim().is_empty() {
        return Err(RagError::InvalidParameter(
            "question must not be empty".to_string(),
        ));
    }
    let top_k = event.top_k.unwrap_or(config.retrieval.top_k);
    if top_k == 0 {
        return Err(RagError::InvalidParameter("top_k must be >= 1".to_string()));
    }

    let retrieved: Retrieved = run
        .step("embed-and-search", || async {
            embed_and_search(services, &event.question, top_k).await
        })
        .await?;

    info!(
        contexts = retrieved.contexts.len(),
        sources = retrieved.sources.len(),
        "retrieval complete"
    );

    // Configurable empty-context policy; the default is to ask the
    // generator anyway, with an empty context block.
    if retrieved.contexts.is_empty() {
        if let Some(answer) = &config.retrieval.no_context_answer {
            return Ok(QueryAnswer {
                answer: answer.clone(),
                sources: retrieved.sources,
                num_contexts: 0,
            });
        }
    }

    let prompt: String = run
        .step("assemble-prompt", || async {
            Ok(build_prompt(&retrieved.contexts, &event.question))
        })
        .await?;

    let answer: String = run
        .step("generate", || {
            let prompt = prompt.clone();
            async move { services.generator.generate(SYSTEM_INSTRUCTION, &prompt).await }
        })
        .await?;

    Ok(QueryAnswer {
        answer: answer.trim().to_string(),
        sources: retrieved.sources,
        num_contexts: retrieved.contexts.len(),
    })
}

/// Step 1: embed the question and collect the nearest chunk texts plus the
/// set of sources they came from. Hits with empty text are dropped and
/// contribute no source.
pub async fn embed_and_search(
    services: &Services,
    question: &str,
    top_k: usize,
) -> Result<Retrieved> {
    let vectors = services.embedder.embed(&[question.to_string()]).await?;
    let query_vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| RagError::EmbeddingService {
            message: "empty embedding response for query".to_string(),
            transient: false,
        })?;

    let hits = services.store.search(&query_vector, top_k).await?;

    let mut retrieved = Retrieved {
        contexts: Vec::with_capacity(hits.len()),
        sources: Default::default(),
    };
    for hit in hits {
        if hit.payload.text.is_empty() {
            continue;
        }
        retrieved.contexts.push(hit.payload.text);
        retrieved.sources.insert(hit.payload.source);
    }

    Ok(retrieved)
}

/// Step 2: wrap the context block and the question into the user prompt.
pub fn build_prompt(contexts: &[String], question: &str) -> String {
    let context_block = contexts.join(CONTEXT_SEPARATOR);
    format!(
        "Answer the question using only the context below. If the context does \
         not contain the answer, say so. Be concise.\n\n\
         Context:\n{}\n\nQuestion: {}",
        context_block, question
    )
}
