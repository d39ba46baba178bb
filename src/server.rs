//! HTTP API.
//!
//! A thin adapter over [`HybridEngine`]: it validates request shape and
//! maps engine errors to status codes. All ranking and ingestion logic
//! lives in the engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/v1/clients` | Create a client |
//! | `GET`  | `/api/v1/clients/{client_id}` | Fetch a client |
//! | `POST` | `/api/v1/clients/{client_id}/documents` | Ingest a document |
//! | `GET`  | `/api/v1/search?q=...` | Hybrid search over clients and documents |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Client not found: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `internal` (500), `embedding_unavailable` (503), `timeout` (504).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use docket_core::error::EngineError;
use docket_core::models::{Client, Document, EntityKind, NewClient, SearchResult};
use docket_core::store::Store;

use crate::clients::email_regex;
use crate::config::Config;
use crate::engine::{self, HybridEngine};
use crate::migrate;

/// Shared application state passed to all route handlers.
struct AppState<S: Store> {
    engine: HybridEngine<S>,
    email: Arc<Regex>,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            email: Arc::clone(&self.email),
        }
    }
}

/// Starts the HTTP server.
///
/// Runs migrations, syncs the thesaurus, binds to `[server].bind`, and
/// serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    migrate::run_migrations(config).await?;
    let engine = engine::open(config).await?;
    let app = router(engine)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(
        bind = %config.server.bind,
        embedding = %config.embedding.provider,
        "docket server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router over any [`Store`] backend.
pub fn router<S: Store + 'static>(engine: HybridEngine<S>) -> anyhow::Result<Router> {
    let state = AppState {
        engine,
        email: Arc::new(email_regex()?),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/v1/clients", post(handle_create_client::<S>))
        .route("/api/v1/clients/{client_id}", get(handle_get_client::<S>))
        .route(
            "/api/v1/clients/{client_id}/documents",
            post(handle_create_document::<S>),
        )
        .route("/api/v1/search", get(handle_search::<S>))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
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
    let message = message.into();
    warn!(%message, "rejected request");
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message,
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let kind = err.kind();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = kind.code(), error = %err, "request failed");
        } else {
            warn!(code = kind.code(), error = %err, "request rejected");
        }
        AppError {
            status,
            code: kind.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn parse_client_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| bad_request(format!("invalid client id: {}", raw)))
}

fn require(field: &str, value: Option<String>) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(bad_request(format!("{} must not be empty", field))),
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

// ============ POST /api/v1/clients ============

#[derive(Deserialize)]
struct CreateClientRequest {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    description: Option<String>,
}

async fn handle_create_client<S: Store + 'static>(
    State(state): State<AppState<S>>,
    payload: Result<Json<CreateClientRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;

    let fields = NewClient {
        first_name: require("first_name", req.first_name)?,
        last_name: require("last_name", req.last_name)?,
        email: require("email", req.email)?,
        description: req.description,
    };
    if !state.email.is_match(&fields.email) {
        return Err(bad_request(format!("invalid email: {}", fields.email)));
    }

    let client = state.engine.create_client(&fields).await?;
    info!(client_id = %client.id, "client created");

    let location = format!("/api/v1/clients/{}", client.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(client)).into_response())
}

// ============ GET /api/v1/clients/{client_id} ============

async fn handle_get_client<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<String>,
) -> Result<Json<Client>, AppError> {
    let id = parse_client_id(&client_id)?;
    Ok(Json(state.engine.get_client(id).await?))
}

// ============ POST /api/v1/clients/{client_id}/documents ============

#[derive(Deserialize)]
struct CreateDocumentRequest {
    title: Option<String>,
    content: Option<String>,
}

async fn handle_create_document<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(client_id): Path<String>,
    payload: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_client_id(&client_id)?;
    // Unknown client is reported before any body problem.
    state.engine.get_client(id).await?;

    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    let title = require("title", req.title)?;
    let content = require("content", req.content)?;

    let document = state.engine.create_document(id, &title, &content).await?;
    info!(
        document_id = %document.id,
        client_id = %id,
        embedded = document.has_embedding(),
        "document created"
    );

    let location = format!("/api/v1/clients/{}/documents/{}", id, document.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(document)).into_response())
}

// ============ GET /api/v1/search ============

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

/// One entry of the search response: the entity's own fields plus `type`
/// and `rank`.
#[derive(Serialize)]
struct SearchHit<'a> {
    #[serde(rename = "type")]
    kind: EntityKind,
    #[serde(flatten)]
    entity: EntityRef<'a>,
    rank: f64,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EntityRef<'a> {
    Client(&'a Client),
    Document(&'a Document),
}

impl<'a> From<&'a SearchResult> for SearchHit<'a> {
    fn from(result: &'a SearchResult) -> Self {
        let entity = match result {
            SearchResult::Client { client, .. } => EntityRef::Client(client),
            SearchResult::Document { document, .. } => EntityRef::Document(document),
        };
        SearchHit {
            kind: result.kind(),
            entity,
            rank: result.score(),
        }
    }
}

async fn handle_search<S: Store + 'static>(
    State(state): State<AppState<S>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let q = require("q", params.q)?;

    let results = state.engine.search_hybrid(&q).await?;
    let hits: Vec<SearchHit<'_>> = results.iter().map(SearchHit::from).collect();
    Ok(Json(hits).into_response())
}
