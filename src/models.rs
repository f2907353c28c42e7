//! Core data types that flow through the ingestion and retrieval pipeline.
//!
//! Everything here is serde round-trippable: step outputs are memoized as
//! JSON by the orchestrator and must survive being restored on a different
//! worker.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace under which chunk identifiers are derived. Fixed so that the
/// same `(source_id, sequence_index)` always maps to the same UUID across
/// processes and re-ingestions.
const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_u128(0x9f2c_1b7a_4d3e_48c6_a05f_7e81_23b9_d410);

/// A contiguous windowed slice of document text; the unit of embedding and
/// retrieval. Identity is derived from `(source_id, sequence_index)`, not
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub sequence_index: u32,
}

impl Chunk {
    /// Deterministic identifier for this chunk. Re-ingesting the same
    /// document under the same `source_id` yields identical ids, so upserts
    /// overwrite rather than duplicate.
    pub fn id(&self) -> Uuid {
        chunk_id(&self.source_id, self.sequence_index)
    }
}

/// UUID v5 of `"{source_id}#{sequence_index}"` under the crate namespace.
pub fn chunk_id(source_id: &str, sequence_index: u32) -> Uuid {
    let name = format!("{}#{}", source_id, sequence_index);
    Uuid::new_v5(&CHUNK_ID_NAMESPACE, name.as_bytes())
}

/// Payload stored alongside each vector in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub text: String,
    pub source: String,
}

/// A point persisted in the vector store: created or overwritten on upsert,
/// read-only during search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A single search hit, ranked by similarity descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub payload: Payload,
}

/// Output of the query pipeline's retrieval step: ordered context texts plus
/// the set of distinct sources they came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieved {
    pub contexts: Vec<String>,
    pub sources: BTreeSet<String>,
}

/// Final answer produced by the query pipeline. Ephemeral — computed per
/// request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: BTreeSet<String>,
    pub num_contexts: usize,
}

/// Ingestion trigger payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEvent {
    pub pdf_path: String,
    #[serde(default)]
    pub source_id: Option<String>,
}

/// Ingestion result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub ingested: usize,
}

/// Query trigger payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEvent {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_deterministic() {
        let a = chunk_id("docs/report.pdf", 3);
        let b = chunk_id("docs/report.pdf", 3);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_ids_vary_by_source_and_index() {
        let base = chunk_id("geo.pdf", 0);
        assert_ne!(base, chunk_id("geo.pdf", 1));
        assert_ne!(base, chunk_id("bio.pdf", 0));
    }

    #[test]
    fn separator_prevents_boundary_collisions() {
        // "doc1" + index 10 must not collide with "doc11" + index 0.
        assert_ne!(chunk_id("doc1", 10), chunk_id("doc11", 0));
    }
}
