//! HTTP surface of the prediction service.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use edurisk_core::{
    error::PredictError,
    pipeline::{output_filename, AppCore},
    schema::{HealthResponse, PredictResponse},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Server-side settings that the prediction core does not care about.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub static_dir: PathBuf,
    pub frontend: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static"),
            frontend: PathBuf::from("frontend.html"),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AppCore>,
    pub prom: PrometheusHandle,
    pub server: Arc<ServerConfig>,
}

pub fn router(state: AppState) -> Router {
    let static_dir = state.server.static_dir.clone();
    let max_upload = state.server.max_upload_bytes;

    Router::new()
        .route("/", get(root))
        .route("/predict", post(predict))
        .route("/predict_csv", post(predict_csv))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body: `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        let status = match e {
            PredictError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            PredictError::MalformedInput(_) | PredictError::SchemaMismatch(_) => {
                StatusCode::BAD_REQUEST
            }
            PredictError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "request failed");
        } else {
            tracing::warn!(status = %self.status, detail = %self.detail, "request rejected");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

async fn root(State(st): State<AppState>) -> Response {
    match tokio::fs::read_to_string(&st.server.frontend).await {
        Ok(page) => Html(page).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, Html("<h1>Frontend not found</h1>")).into_response(),
    }
}

async fn predict(
    State(st): State<AppState>,
    Json(record): Json<Map<String, Value>>,
) -> Result<Json<PredictResponse>, ApiError> {
    let resp = st.core.predict_record(&record)?;
    Ok(Json(resp))
}

async fn predict_csv(
    State(st): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    // gate before buffering the upload
    if !st.core.is_ready() {
        return Err(PredictError::ModelUnavailable.into());
    }

    let (file_name, data) = read_upload(&mut multipart).await?;
    tracing::info!(file = ?file_name, bytes = data.len(), "csv upload received");
    metrics::histogram!("upload_bytes").record(data.len() as f64);

    // scoring is CPU bound; keep it off the async workers
    let core = Arc::clone(&st.core);
    let csv = tokio::task::spawn_blocking(move || core.predict_csv(&data))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("batch task: {e}")))??;

    let filename = output_filename(file_name.as_deref());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    )
        .into_response())
}

/// The `file` field, or else the first field that carries a filename.
async fn read_upload(multipart: &mut Multipart) -> Result<(Option<String>, Vec<u8>), ApiError> {
    let mut fallback: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        let is_file = field.name() == Some("file");
        let file_name = field.file_name().map(str::to_string);
        if !is_file && (file_name.is_none() || fallback.is_some()) {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        if is_file {
            return Ok((file_name, data.to_vec()));
        }
        fallback = Some((file_name, data.to_vec()));
    }

    fallback.ok_or_else(|| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "No file uploaded"))
}

async fn health(State(st): State<AppState>) -> Json<HealthResponse> {
    Json(st.core.health())
}

async fn metrics(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.prom.render())
}
