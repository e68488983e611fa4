//! HTTP API over the document store and compiler.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use datatex_core::compiler::{CompileError, CompiledDocument};
use datatex_core::models::{
    ChapterSummary, CreateFileInput, DocumentFile, FileEntry, UpdateFileInput,
};
use datatex_core::{Compiler, Database, ErrorKind};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub compiler: Compiler,
}

pub fn create_router(db: Database, compiler: Compiler) -> Router {
    let state = AppState { db, compiler };

    Router::new()
        .route("/health", get(health))
        .route("/api/files", get(list_files).post(create_file))
        .route(
            "/api/files/{id}",
            get(get_file).put(update_file).delete(delete_file),
        )
        .route("/api/chapters", get(list_chapters))
        .route("/api/compile", post(compile))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

pub enum ApiError {
    Store(datatex_core::Error),
    /// The blocking task running a store call panicked or was cancelled.
    Task(JoinError),
}

impl From<datatex_core::Error> for ApiError {
    fn from(err: datatex_core::Error) -> Self {
        Self::Store(err)
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        Self::Task(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            Self::Store(err) => err,
            Self::Task(err) => {
                tracing::error!("Store task failed: {}", err);
                let body = Json(serde_json::json!({ "error": "internal error" }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };

        let kind = err.kind();
        let status = match kind {
            ErrorKind::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ConstraintViolation => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": err.to_string(),
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a store call on the blocking pool. rusqlite blocks on disk I/O and on
/// the shared connection lock.
async fn with_store<T, F>(db: &Database, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> datatex_core::Result<T> + Send + 'static,
{
    let db = db.clone();
    Ok(tokio::task::spawn_blocking(move || f(&db)).await??)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct Changed {
    pub changed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompileRequest {
    pub content: String,
}

/// Compile outcome as seen by clients. `data` is the base64-encoded PDF.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompileResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub logs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl From<Result<CompiledDocument, CompileError>> for CompileResponse {
    fn from(result: Result<CompiledDocument, CompileError>) -> Self {
        match result {
            Ok(doc) => Self {
                success: true,
                data: Some(base64::engine::general_purpose::STANDARD.encode(&doc.pdf)),
                logs: doc.logs,
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(err.kind()),
                logs: err.logs,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub store_ready: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        store_ready: state.db.is_ready(),
    })
}

async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Vec<FileEntry>>> {
    tracing::debug!("Listing files");
    Ok(Json(with_store(&state.db, |db| db.list_files()).await?))
}

async fn create_file(
    State(state): State<AppState>,
    Json(input): Json<CreateFileInput>,
) -> ApiResult<(StatusCode, Json<FileEntry>)> {
    tracing::info!("Creating file {}", input.title);
    let entry = with_store(&state.db, move |db| db.create_file(input)).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentFile>> {
    Ok(Json(with_store(&state.db, move |db| db.get_file(&id)).await?))
}

async fn update_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateFileInput>,
) -> ApiResult<Json<Changed>> {
    tracing::info!("Updating file {}", id);
    let changed =
        with_store(&state.db, move |db| db.update_file_content(&id, &input.content)).await?;
    Ok(Json(Changed { changed }))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Changed>> {
    tracing::info!("Deleting file {}", id);
    let changed = with_store(&state.db, move |db| db.delete_file(&id)).await?;
    Ok(Json(Changed { changed }))
}

async fn list_chapters(State(state): State<AppState>) -> ApiResult<Json<Vec<ChapterSummary>>> {
    Ok(Json(with_store(&state.db, |db| db.list_chapters()).await?))
}

async fn compile(
    State(state): State<AppState>,
    Json(req): Json<CompileRequest>,
) -> Json<CompileResponse> {
    tracing::info!("Compile requested ({} bytes)", req.content.len());
    Json(state.compiler.compile(&req.content).await.into())
}
