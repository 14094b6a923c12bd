use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use jarvis_rag::{EngineStats, RagEngine, RagError};
use thiserror::Error;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::protocol::{
    AddDocumentsRequest, AddKnowledgeRequest, ErrorResponse, HealthResponse, QueryRequest,
    QueryResponse, RootResponse, StatusResponse,
};

/// Document type recorded for files received through `/knowledge/upload`.
pub const UPLOADED_FILE_TYPE: &str = "uploaded_file";

#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: Arc<RagEngine>,
}

impl AppState {
    pub fn new(engine: Arc<RagEngine>) -> Self {
        Self { engine }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

/// A request failure rendered as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Backend(#[from] RagError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { detail: self.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/query", post(query))
        .route("/knowledge/add", post(add_knowledge))
        .route("/knowledge/add-documents", post(add_documents))
        .route("/knowledge/upload", post(upload_file))
        .route("/knowledge/clear", delete(clear_knowledge))
        .route("/conversation/clear", post(clear_conversation))
        .route("/stats", get(stats))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve `engine` until Ctrl-C or SIGTERM.
pub async fn run_server(config: ServerConfig, engine: Arc<RagEngine>) -> anyhow::Result<()> {
    let app = app_router(AppState::new(engine));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for jarvis server")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("jarvis listening on http://{}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("jarvis stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Jarvis AI Assistant API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.engine.check_health().await.into())
}

async fn query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> Json<QueryResponse> {
    // Retrieval and generation failures are logged by the engine.
    let result = state.engine.answer(&request.question, request.use_context, request.top_k).await;
    Json(result.into())
}

async fn add_knowledge(
    State(state): State<AppState>,
    Json(request): Json<AddKnowledgeRequest>,
) -> ApiResult<StatusResponse> {
    let stored = state
        .engine
        .add_knowledge(&request.text, request.doc_name.as_deref(), request.doc_type.as_deref())
        .await
        .inspect_err(|e| error!(error = %e, "error adding knowledge"))?;

    if stored == 0 {
        return Err(ApiError::BadRequest("text cannot be empty".to_string()));
    }
    Ok(Json(StatusResponse::success("Knowledge added successfully")))
}

async fn add_documents(
    State(state): State<AppState>,
    Json(request): Json<AddDocumentsRequest>,
) -> ApiResult<StatusResponse> {
    if request.documents.is_empty() {
        return Err(ApiError::BadRequest("documents cannot be empty".to_string()));
    }

    let stored = state
        .engine
        .add_documents(&request.documents)
        .await
        .inspect_err(|e| error!(error = %e, "error adding documents"))?;

    if stored == 0 {
        return Err(ApiError::BadRequest("documents contain no text".to_string()));
    }
    Ok(Json(StatusResponse::success(format!("Added {} documents", request.documents.len()))))
}

async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<StatusResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| ApiError::BadRequest("file is not valid UTF-8 text".to_string()))?;

        let stored = state
            .engine
            .add_knowledge(&text, file_name.as_deref(), Some(UPLOADED_FILE_TYPE))
            .await
            .inspect_err(|e| error!(error = %e, "error uploading file"))?;

        if stored == 0 {
            return Err(ApiError::BadRequest("file contains no text".to_string()));
        }
        let name = file_name.as_deref().unwrap_or(jarvis_rag::chunking::DEFAULT_DOC_NAME);
        return Ok(Json(StatusResponse::success(format!("File '{name}' processed and added"))));
    }

    Err(ApiError::BadRequest("missing multipart field 'file'".to_string()))
}

async fn clear_knowledge(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    state
        .engine
        .clear_knowledge()
        .await
        .inspect_err(|e| error!(error = %e, "error clearing knowledge"))?;
    Ok(Json(StatusResponse::success("Knowledge cleared")))
}

async fn clear_conversation(State(state): State<AppState>) -> Json<StatusResponse> {
    state.engine.clear_conversation().await;
    Json(StatusResponse::success("Conversation cleared"))
}

async fn stats(State(state): State<AppState>) -> Json<EngineStats> {
    Json(state.engine.stats().await)
}
