//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/documents/` | List uploaded documents in upload order |
//! | `POST` | `/documents/` | Upload a document (multipart `file`, optional `name`) |
//! | `POST` | `/ask-question/` | Answer `{"question": "..."}` from the knowledge base |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "No documents found in database. Please upload some documents first." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend on
//! another port can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ask::{answer_question, Answer, AskError};
use crate::config::Config;
use crate::embedding::{create_provider, Embedder};
use crate::llm::{create_generator, Generator};
use crate::models::Document;
use crate::store;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
}

/// Build the router over an already-migrated pool and constructed providers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.server.max_upload_mb * 1024 * 1024;

    Router::new()
        .route(
            "/documents/",
            get(handle_list_documents).post(handle_upload_document),
        )
        .route("/ask-question/", post(handle_ask_question))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Connect, migrate, build providers and serve until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::connect(config).await?;
    crate::migrate::migrate_pool(&pool).await?;

    let embedder = create_provider(&config.embedding)?;
    let generator = create_generator(&config.llm)?;
    tracing::info!(
        embedding_model = embedder.model_name(),
        generation_model = generator.model_name(),
        "providers ready"
    );
    if !config.embedding.is_enabled() {
        tracing::warn!("embedding provider is disabled; uploads will be stored without an index");
    }

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        embedder,
        generator,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
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

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<AskError> for AppError {
    fn from(err: AskError) -> Self {
        let message = err.to_string();
        match err {
            AskError::EmptyQuestion => bad_request(message),
            AskError::NoDocuments | AskError::IndexDirMissing(_) | AskError::NoIndexFiles(_) => {
                not_found(message)
            }
            AskError::Internal(_) => internal(message),
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

// ============ GET /documents/ ============

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<DocumentSummary>,
}

#[derive(Serialize)]
struct DocumentSummary {
    id: i64,
    name: String,
    uploaded_at: DateTime<Utc>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = store::list_documents(&state.pool)
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;

    Ok(Json(DocumentListResponse {
        documents: documents
            .into_iter()
            .map(|d| DocumentSummary {
                id: d.id,
                name: d.name,
                uploaded_at: d.uploaded_at,
            })
            .collect(),
    }))
}

// ============ POST /documents/ ============

async fn handle_upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        let field_name = field.name().map(|s| s.to_string());
        match field_name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
                upload = Some((file_name, bytes.to_vec()));
            }
            Some("name") => {
                name = Some(field.text().await.map_err(|e| bad_request(e.body_text()))?);
            }
            _ => {}
        }
    }

    let (file_name, bytes) = upload.ok_or_else(|| bad_request("No file provided"))?;
    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| file_name.clone());

    let file = store::store_upload(&state.config.media.root, &file_name, &bytes)
        .map_err(|e| internal(format!("{:#}", e)))?;
    let document = store::save_document(
        &state.pool,
        &state.config,
        state.embedder.as_ref(),
        &name,
        &file,
    )
    .await
    .map_err(|e| internal(format!("{:#}", e)))?;

    Ok((StatusCode::CREATED, Json(document)))
}

// ============ POST /ask-question/ ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

async fn handle_ask_question(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let question = request.question.unwrap_or_default();

    let answer = answer_question(
        &state.pool,
        &state.config,
        state.embedder.as_ref(),
        state.generator.as_ref(),
        &question,
    )
    .await
    .map_err(|e| {
        if let AskError::Internal(detail) = &e {
            tracing::error!(error = %detail, "error processing question");
        }
        AppError::from(e)
    })?;

    Ok(Json(answer))
}
