//! HTTP surface: upload, ask, clear and a health probe.

use crate::error::{RagError, Result};
use crate::memory::Session;
use crate::rag::RagEngine;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Limits applied at the HTTP boundary
#[derive(Debug, Clone, Copy)]
pub struct ServerLimits {
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for ServerLimits {
    fn default() -> Self {
        ServerLimits {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Shared router state.
///
/// Requests run concurrently against the single chat session. A question
/// reads the history once before generation and appends once after it, so a
/// clear or upload landing in between is not seen by that question.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<RagEngine>,
    session: Arc<Session>,
    limits: ServerLimits,
}

impl AppState {
    pub fn new(engine: Arc<RagEngine>, limits: ServerLimits) -> Self {
        AppState {
            engine,
            session: Arc::new(Session::new()),
            limits,
        }
    }

    /// Bound one engine call by the request timeout
    async fn within_timeout<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.limits.request_timeout;
        tokio::time::timeout(limit, work).await.map_err(|_| {
            RagError::ServiceUnavailable(format!("request timed out after {:?}", limit))
        })?
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub indexed_chunks: usize,
    pub turns: usize,
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        let status = match &self {
            RagError::EmptyDocument => StatusCode::BAD_REQUEST,
            RagError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RagError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RagError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = state.limits.max_upload_bytes;

    Router::new()
        .route("/upload", post(upload))
        .route("/ask", post(ask))
        .route("/clear", delete(clear))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>> {
    let (file_name, bytes) = read_file_field(multipart)
        .await
        .inspect_err(|e| error!("Upload error: {}", e))?;
    info!("Upload received: {} ({} bytes)", file_name, bytes.len());

    let report = state
        .within_timeout(state.engine.ingest(&file_name, bytes, &state.session))
        .await
        .inspect_err(|e| error!("Upload error for {}: {}", file_name, e))?;

    info!(
        "Indexed {} chunks from {}",
        report.chunk_count, report.source
    );

    Ok(Json(MessageResponse {
        message: report.message(),
    }))
}

/// Pull the `file` field (name and contents) out of a multipart body
async fn read_file_field(
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(String, Vec<u8>)> {
    let mut multipart = multipart.map_err(|e| RagError::Validation(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RagError::Validation(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| RagError::Validation("file field has no file name".into()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| RagError::Validation(e.body_text()))?;

        return Ok((file_name, bytes.to_vec()));
    }

    Err(RagError::Validation("multipart body has no file field".into()))
}

async fn ask(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>> {
    let Json(request) = payload.map_err(|e| {
        let err = RagError::Validation(e.body_text());
        error!("Chat error: {}", err);
        err
    })?;

    let response = state
        .within_timeout(state.engine.ask(&request.query, &state.session))
        .await
        .inspect_err(|e| error!("Chat error: {}", e))?;

    Ok(Json(AskResponse { response }))
}

async fn clear(State(state): State<AppState>) -> Json<MessageResponse> {
    state.engine.clear(&state.session);

    Json(MessageResponse {
        message: "Memory cleared.".to_string(),
    })
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let indexed_chunks = state.engine.index().len().await?;
    let turns = state.session.len();

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        indexed_chunks,
        turns,
    }))
}
