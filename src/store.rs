//! Vector store boundary.
//!
//! [`VectorStore`] is the capability set the pipelines need: ensure the
//! collection exists, upsert records, and run nearest-neighbor search. The
//! trait never leaks engine-specific types; backends translate to and from
//! the shared [`StoredRecord`] / [`SearchHit`] shapes.
//!
//! Two backends:
//! - [`QdrantStore`] — Qdrant over its REST API (cosine distance).
//! - [`MemoryStore`] — in-process map with brute-force cosine scoring, used
//!   by the test suite and available as `store.backend = "memory"`.
//!
//! Dimension checks run client-side on every upsert so a misconfigured
//! embedding model fails with [`RagError::DimensionMismatch`] instead of
//! whatever the engine would report (or silently accept).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{Payload, SearchHit, StoredRecord};

/// Persistent collection of `(id, vector, payload)` triples.
#[async_trait]
pub trait VectorStore: Send + Sync + std::fmt::Debug {
    /// Create the collection if absent. Idempotent; fails with
    /// `DimensionMismatch` if it already exists with a different dimension.
    async fn ensure_collection(&self, dims: usize) -> Result<()>;

    /// Insert-or-overwrite by id. The batch is all-or-nothing from the
    /// caller's perspective: dimensions are validated up front and the
    /// engine call covers the whole batch.
    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<()>;

    /// Top-`k` records by cosine similarity, descending. Returns fewer than
    /// `k` results when the collection is smaller, and an empty vec for an
    /// empty collection.
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;
}

fn check_dims(records: &[StoredRecord], expected: usize) -> Result<()> {
    for record in records {
        if record.vector.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: record.vector.len(),
            });
        }
    }
    Ok(())
}

// ============ Qdrant backend ============

/// Qdrant REST client scoped to a single collection.
///
/// Tie-breaking among equally-scored points is whatever the engine returns;
/// Qdrant does not document a stable order and neither do we.
#[derive(Debug)]
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dims: usize,
}

impl QdrantStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::StoreUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            dims: config.dims,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }
}

#[derive(Deserialize)]
struct QdrantCollectionInfo {
    result: QdrantCollectionResult,
}

#[derive(Deserialize)]
struct QdrantCollectionResult {
    config: QdrantCollectionConfig,
}

#[derive(Deserialize)]
struct QdrantCollectionConfig {
    params: QdrantCollectionParams,
}

#[derive(Deserialize)]
struct QdrantCollectionParams {
    vectors: QdrantVectorParams,
}

#[derive(Deserialize)]
struct QdrantVectorParams {
    size: usize,
}

#[derive(Deserialize)]
struct QdrantSearchResponse {
    result: Vec<QdrantScoredPoint>,
}

#[derive(Deserialize)]
struct QdrantScoredPoint {
    score: f32,
    payload: Option<Payload>,
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        let resp = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(|e| RagError::StoreUnavailable(e.to_string()))?;

        if resp.status().is_success() {
            let info: QdrantCollectionInfo = resp
                .json()
                .await
                .map_err(|e| RagError::StoreUnavailable(format!("invalid response: {}", e)))?;
            let existing = info.result.config.params.vectors.size;
            if existing != dims {
                return Err(RagError::DimensionMismatch {
                    expected: existing,
                    actual: dims,
                });
            }
            return Ok(());
        }

        if resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(RagError::StoreUnavailable(format!(
                "HTTP {} while checking collection",
                resp.status()
            )));
        }

        let body = serde_json::json!({
            "vectors": { "size": dims, "distance": "Cosine" }
        });
        let resp = self
            .client
            .put(self.collection_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::StoreUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(RagError::StoreUnavailable(format!(
                "failed to create collection: HTTP {}: {}",
                status, body_text
            )));
        }

        Ok(())
    }

    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        check_dims(&records, self.dims)?;

        let points: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id.to_string(),
                    "vector": r.vector,
                    "payload": r.payload,
                })
            })
            .collect();

        // wait=true: points are visible to subsequent searches on return.
        let resp = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&serde_json::json!({ "points": points }))
            .send()
            .await
            .map_err(|e| RagError::StoreUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(RagError::StoreUnavailable(format!(
                "upsert failed: HTTP {}: {}",
                status, body_text
            )));
        }

        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let body = serde_json::json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });

        let resp = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::StoreUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(RagError::StoreUnavailable(format!(
                "search failed: HTTP {}: {}",
                status, body_text
            )));
        }

        let parsed: QdrantSearchResponse = resp
            .json()
            .await
            .map_err(|e| RagError::StoreUnavailable(format!("invalid response: {}", e)))?;

        Ok(parsed
            .result
            .into_iter()
            .filter_map(|p| {
                p.payload.map(|payload| SearchHit {
                    score: p.score,
                    payload,
                })
            })
            .collect())
    }
}

// ============ In-memory backend ============

/// Volatile in-process store with brute-force cosine search.
///
/// Tie-break is deterministic: score descending, then id ascending.
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, StoredRecord>>,
    dims: RwLock<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            dims: RwLock::new(None),
        }
    }

    /// Number of records currently held. Test hook for idempotency checks.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expected_dims(&self) -> Result<usize> {
        self.dims
            .read()
            .map_err(|_| RagError::StoreUnavailable("store lock poisoned".to_string()))?
            .ok_or_else(|| {
                RagError::InvalidParameter("collection has not been created".to_string())
            })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        let mut guard = self
            .dims
            .write()
            .map_err(|_| RagError::StoreUnavailable("store lock poisoned".to_string()))?;
        match *guard {
            None => {
                *guard = Some(dims);
                Ok(())
            }
            Some(existing) if existing == dims => Ok(()),
            Some(existing) => Err(RagError::DimensionMismatch {
                expected: existing,
                actual: dims,
            }),
        }
    }

    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        check_dims(&records, self.expected_dims()?)?;

        let mut guard = self
            .records
            .write()
            .map_err(|_| RagError::StoreUnavailable("store lock poisoned".to_string()))?;
        for record in records {
            guard.insert(record.id, record);
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let guard = self
            .records
            .read()
            .map_err(|_| RagError::StoreUnavailable("store lock poisoned".to_string()))?;

        let mut scored: Vec<(f32, Uuid, Payload)> = guard
            .values()
            .map(|r| {
                (
                    cosine_similarity(vector, &r.vector),
                    r.id,
                    r.payload.clone(),
                )
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, _, payload)| SearchHit { score, payload })
            .collect())
    }
}

/// Construct the backend named in the configuration.
pub fn create_store(config: &StoreConfig) -> Result<Box<dyn VectorStore>> {
    match config.backend.as_str() {
        "qdrant" => Ok(Box::new(QdrantStore::new(config)?)),
        "memory" => Ok(Box::new(MemoryStore::new())),
        other => Err(RagError::InvalidParameter(format!(
            "unknown store backend: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunk_id;

    fn record(source: &str, index: u32, vector: Vec<f32>) -> StoredRecord {
        StoredRecord {
            id: chunk_id(source, index),
            vector,
            payload: Payload {
                text: format!("chunk {} of {}", index, source),
                source: source.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let store = MemoryStore::new();
        store.ensure_collection(4).await.unwrap();
        store.ensure_collection(4).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_collection_rejects_dimension_change() {
        let store = MemoryStore::new();
        store.ensure_collection(3072).await.unwrap();
        let err = store.ensure_collection(1536).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 3072,
                actual: 1536
            }
        ));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = MemoryStore::new();
        store.ensure_collection(3).await.unwrap();
        let err = store
            .upsert(vec![record("doc", 0, vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
        assert!(store.is_empty(), "nothing written on a rejected batch");
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let store = MemoryStore::new();
        store.ensure_collection(2).await.unwrap();
        store
            .upsert(vec![record("doc", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(vec![record("doc", 0, vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn search_ranks_nearest_first() {
        let store = MemoryStore::new();
        store.ensure_collection(2).await.unwrap();
        store
            .upsert(vec![
                record("north", 0, vec![0.0, 1.0]),
                record("east", 0, vec![1.0, 0.0]),
                record("diagonal", 0, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits[0].payload.source, "east");
        assert!(hits[0].score > hits[1].score);
        assert!(hits[1].score >= hits[2].score);
    }

    #[tokio::test]
    async fn search_bounds() {
        let store = MemoryStore::new();
        store.ensure_collection(2).await.unwrap();
        store
            .upsert(vec![
                record("a", 0, vec![1.0, 0.0]),
                record("b", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.search(&[1.0, 0.0], 1).await.unwrap().len(), 1);
        // k larger than the collection returns collection-size results
        assert_eq!(store.search(&[1.0, 0.0], 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_collection_returns_no_hits() {
        let store = MemoryStore::new();
        store.ensure_collection(2).await.unwrap();
        assert!(store.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[test]
    fn create_store_rejects_unknown_backend() {
        let config = StoreConfig {
            backend: "postgres".to_string(),
            ..StoreConfig::default()
        };
        assert!(matches!(
            create_store(&config).unwrap_err(),
            RagError::InvalidParameter(_)
        ));
    }
}
