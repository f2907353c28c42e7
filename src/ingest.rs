//! Ingestion pipeline: `Loaded → Chunked → Embedded → Upserted`.
//!
//! Two steps, each independently retriable and memoized by the step runner:
//!
//! 1. `load-and-chunk` — extract text from the document and window it into
//!    chunks. CPU/IO-bound, no network dependency beyond file access.
//! 2. `upsert` — embed every chunk in one batch, derive deterministic
//!    identifiers, and upsert into the vector store. Network-bound and
//!    billable; the split means a retry here never re-parses the document.
//!
//! Re-running the whole pipeline with the same `source_id` overwrites the
//! same records, so ingestion is idempotent end to end.

use tracing::info;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::error::{RagError, Result};
use crate::extract::load_document;
use crate::models::{Chunk, IngestEvent, IngestReceipt, Payload, StoredRecord};
use crate::orchestrator::PipelineRun;
use crate::services::Services;

/// Run the ingestion pipeline for one document.
pub async fn run_ingest(
    services: &Services,
    config: &Config,
    run: &PipelineRun,
    event: &IngestEvent,
) -> Result<IngestReceipt> {
    if event.pdf_path.trim().is_empty() {
        return Err(RagError::InvalidParameter(
            "pdf_path must not be empty".to_string(),
        ));
    }

    // The document path doubles as the stable source identifier unless the
    // caller supplies one.
    let source_id = event
        .source_id
        .clone()
        .unwrap_or_else(|| event.pdf_path.clone());

    let chunks: Vec<Chunk> = run
        .step("load-and-chunk", || async {
            load_and_chunk(
                &event.pdf_path,
                &source_id,
                config.chunking.window,
                config.chunking.overlap,
            )
        })
        .await?;

    info!(
        source_id = %source_id,
        chunks = chunks.len(),
        "document loaded and chunked"
    );

    let receipt: IngestReceipt = run
        .step("upsert", || {
            let chunks = chunks.clone();
            async move { embed_and_upsert(services, config, &chunks).await }
        })
        .await?;

    info!(source_id = %source_id, ingested = receipt.ingested, "ingestion complete");
    Ok(receipt)
}

/// Step 1: extract the document text and produce the chunk sequence.
pub fn load_and_chunk(
    path: &str,
    source_id: &str,
    window: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    let text = load_document(std::path::Path::new(path))?;
    Ok(chunk_text(source_id, &text, window, overlap)?.collect())
}

/// Step 2: embed all chunks in one batch and upsert them under their
/// deterministic identifiers. Returns the count of chunks ingested.
pub async fn embed_and_upsert(
    services: &Services,
    config: &Config,
    chunks: &[Chunk],
) -> Result<IngestReceipt> {
    services
        .store
        .ensure_collection(config.store.dims)
        .await?;

    if chunks.is_empty() {
        return Ok(IngestReceipt { ingested: 0 });
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = services.embedder.embed(&texts).await?;

    let records: Vec<StoredRecord> = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, vector)| StoredRecord {
            id: chunk.id(),
            vector,
            payload: Payload {
                text: chunk.text.clone(),
                source: chunk.source_id.clone(),
            },
        })
        .collect();

    let count = records.len();
    services.store.upsert(records).await?;

    Ok(IngestReceipt { ingested: count })
}
