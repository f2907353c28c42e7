//! # Ragline
//!
//! A two-stage retrieval-augmented-generation pipeline: ingest a document,
//! window it into overlapping chunks, embed and persist the chunks in a
//! vector index, then answer questions by retrieving the nearest chunks and
//! asking a language model for an answer grounded in them.
//!
//! ## Architecture
//!
//! ```text
//! ingest:  document ──▶ chunker ──▶ embedder ──▶ vector store
//!
//! query:   question ──▶ embedder ──▶ vector store ──▶ prompt ──▶ generator
//! ```
//!
//! Both flows run as sequences of named, independently retriable steps
//! ([`orchestrator`]); step outputs are explicit serde values so a run can
//! resume after a crash without re-executing completed steps. Chunk
//! identifiers are deterministic functions of `(source_id, sequence_index)`,
//! which makes re-ingestion overwrite rather than duplicate.
//!
//! ## Quick Start
//!
//! ```bash
//! rag ingest ./docs/geo.pdf          # chunk, embed, and index a document
//! rag query "What is the capital of France?"
//! rag serve                          # expose both pipelines over HTTP
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Sliding-window chunking |
//! | [`extract`] | Document loading (PDF, plain text) |
//! | [`embedding`] | Embedding service boundary |
//! | [`generation`] | Generation service boundary |
//! | [`store`] | Vector store trait and backends |
//! | [`orchestrator`] | Step runner: memoization and retry |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Query pipeline |
//! | [`services`] | Process-wide service handles |
//! | [`server`] | HTTP event triggers |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod server;
pub mod services;
pub mod store;
