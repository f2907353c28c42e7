//! HTTP event triggers.
//!
//! Exposes the two pipelines as JSON endpoints so an external event bus or
//! durable-execution engine can invoke them:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/events/ingest` | Ingest a document: `{pdf_path, source_id?}` → `{ingested}` |
//! | `POST` | `/events/query` | Answer a question: `{question, top_k?}` → `{answer, sources, num_contexts}` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Error responses use the schema `{ "error": { "code": ..., "message": ... } }`
//! with codes mapped from the error taxonomy: `invalid_parameter` and
//! `document_load` (400), `dimension_mismatch` and `state` (500),
//! `embedding_service` / `generation_service` (502), `store_unavailable`
//! (503). A failed invocation carries the triggering error kind; no partial
//! answers are returned.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::RagError;
use crate::ingest::run_ingest;
use crate::models::{IngestEvent, IngestReceipt, QueryAnswer, QueryEvent};
use crate::orchestrator::{PipelineRun, RetryPolicy};
use crate::query::run_query;
use crate::services::Services;

/// Shared application state: config plus the process-wide service handles.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    services: Services,
}

/// Start the event server. Runs until the process is terminated.
pub async fn run_server(config: &Config, services: Services) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        services,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/events/ingest", post(handle_ingest))
        .route("/events/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("rag event server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "invalid_parameter"),
            RagError::DocumentLoad { .. } => (StatusCode::BAD_REQUEST, "document_load"),
            RagError::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch")
            }
            RagError::State(_) => (StatusCode::INTERNAL_SERVER_ERROR, "state"),
            RagError::EmbeddingService { .. } => (StatusCode::BAD_GATEWAY, "embedding_service"),
            RagError::GenerationService { .. } => (StatusCode::BAD_GATEWAY, "generation_service"),
            RagError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /events/ingest ============

async fn handle_ingest(
    State(state): State<AppState>,
    Json(event): Json<IngestEvent>,
) -> Result<Json<IngestReceipt>, AppError> {
    let run = PipelineRun::new(RetryPolicy::from_config(&state.config.orchestrator));
    let receipt = run_ingest(&state.services, &state.config, &run, &event).await?;
    Ok(Json(receipt))
}

// ============ POST /events/query ============

async fn handle_query(
    State(state): State<AppState>,
    Json(event): Json<QueryEvent>,
) -> Result<Json<QueryAnswer>, AppError> {
    let run = PipelineRun::new(RetryPolicy::from_config(&state.config.orchestrator));
    let answer = run_query(&state.services, &state.config, &run, &event).await?;
    Ok(Json(answer))
}
