//! HTTP API exposing the catalog session and the metadata admin surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::download::{BatchDownloader, DownloadProgress, NoProgress};
use crate::error::Error;
use crate::listing::{self, ListingSource};
use crate::metadata::{self, JsonFileStore, MetadataSource, MetadataStore};
use crate::record::CaseId;
use crate::report::{DownloadMode, DownloadReport, error_status_text};
use crate::session::{CatalogSession, SessionAction, fetch_snapshot, load_session};

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<CatalogSession>>,
    downloader: Arc<BatchDownloader>,
    metadata: Arc<dyn MetadataSource>,
    listing: Option<Arc<dyn ListingSource>>,
    store: Arc<dyn MetadataStore>,
    prefix: String,
}

impl AppState {
    /// Bundles a session with its collaborators.
    #[must_use]
    pub fn new(
        session: CatalogSession,
        downloader: BatchDownloader,
        metadata: Arc<dyn MetadataSource>,
        listing: Option<Arc<dyn ListingSource>>,
        store: Arc<dyn MetadataStore>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            downloader: Arc::new(downloader),
            metadata,
            listing,
            store,
            prefix: prefix.into(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    detail: String,
}

#[derive(Deserialize)]
struct DownloadRequest {
    #[serde(default)]
    mode: DownloadMode,
    /// Download every visible file of this case instead of the selection.
    #[serde(default)]
    case: Option<CaseId>,
}

#[derive(Serialize)]
struct DownloadResponse {
    status: String,
    report: DownloadReport,
}

#[derive(Deserialize)]
struct DeleteQuery {
    name: String,
}

#[derive(Serialize)]
struct DeleteResponse {
    removed: usize,
}

/// An [`Error`] rendered as a JSON response.
struct ApiError(StatusCode, ErrorBody);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::EmptyBatch => StatusCode::BAD_REQUEST,
            Error::Oversize { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::AllFailed { .. } | Error::Metadata(_) | Error::Listing(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::InvalidRecord(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error = match &e {
            Error::EmptyBatch | Error::Oversize { .. } | Error::AllFailed { .. } => {
                error_status_text(&e)
            }
            other => other.to_string(),
        };
        Self(
            status,
            ErrorBody {
                error,
                detail: e.to_string(),
            },
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, axum::Json(self.1)).into_response()
    }
}

fn not_found(what: String) -> ApiError {
    ApiError(
        StatusCode::NOT_FOUND,
        ErrorBody {
            error: "Not found".to_string(),
            detail: what,
        },
    )
}

async fn api_health() -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn api_catalog(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.session.lock().await.view())
}

async fn api_case_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = CaseId::new(id);
    let files = state.session.lock().await.files_view(&id);
    files
        .map(axum::Json)
        .ok_or_else(|| not_found(format!("case {id}")))
}

async fn api_domains(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.session.lock().await.domains())
}

async fn api_actions(
    State(state): State<AppState>,
    axum::Json(action): axum::Json<SessionAction>,
) -> impl IntoResponse {
    let mut session = state.session.lock().await;
    if !session.apply(action.clone()) {
        log::debug!("Action had no effect: {action:?}");
    }
    axum::Json(session.view())
}

async fn api_refresh(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = fetch_snapshot(
        state.metadata.as_ref(),
        state.listing.as_deref(),
        &state.prefix,
    )
    .await?;
    let mut session = state.session.lock().await;
    session.refresh_from(snapshot);
    Ok(axum::Json(session.view()))
}

async fn api_download(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<DownloadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = {
        let session = state.session.lock().await;
        match &request.case {
            Some(id) => session
                .case_batch(id)
                .ok_or_else(|| not_found(format!("case {id}")))?,
            None => session.download_batch(),
        }
    };

    let progress: Arc<dyn DownloadProgress> = Arc::new(NoProgress);
    let report = state
        .downloader
        .download(&batch, request.mode, &progress)
        .await?;
    Ok(axum::Json(DownloadResponse {
        status: report.status_text(),
        report,
    }))
}

async fn api_metadata_list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(axum::Json(state.store.list().await?))
}

async fn api_metadata_append(
    State(state): State<AppState>,
    axum::Json(record): axum::Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.store.append(record).await?;
    Ok((StatusCode::CREATED, axum::Json(items)))
}

async fn api_metadata_delete(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.store.delete_by_name(&query.name).await?;
    Ok(axum::Json(DeleteResponse { removed }))
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(api_health))
        .route("/api/catalog", get(api_catalog))
        .route("/api/cases/{id}/files", get(api_case_files))
        .route("/api/domains", get(api_domains))
        .route("/api/actions", post(api_actions))
        .route("/api/refresh", post(api_refresh))
        .route("/api/download", post(api_download))
        .route(
            "/api/metadata",
            get(api_metadata_list)
                .post(api_metadata_append)
                .delete(api_metadata_delete),
        )
        .layer(cors)
        .with_state(state)
}

/// Builds the server state from configuration and loads the initial session.
///
/// A metadata failure is logged and leaves an empty session; `POST
/// /api/refresh` retries it.
pub async fn build_state(config: &AppConfig) -> AppState {
    let store = Arc::new(JsonFileStore::new(config.admin.metadata_file.clone()));
    let metadata = metadata::source_from_config(config);
    let listing = listing::source_from_config(&config.sources);

    let session = match load_session(
        metadata.as_ref(),
        listing.as_deref(),
        &config.sources.listing_prefix,
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            log::error!("Starting with an empty catalog: {e}");
            CatalogSession::default()
        }
    };

    AppState::new(
        session,
        BatchDownloader::new(config.download.clone()),
        metadata,
        listing,
        store,
        config.sources.listing_prefix.clone(),
    )
}

/// Runs the API server until it fails.
///
/// # Errors
///
/// Returns an error if the server cannot bind to the configured address.
pub async fn run_server(config: &AppConfig) -> crate::Result<()> {
    let state = build_state(config).await;
    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .map_err(|e| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("bad API address: {e}"),
            ))
        })?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("API server listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
