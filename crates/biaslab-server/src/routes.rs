//! HTTP routes and handlers

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use biaslab_core::{ArticleVerdict, MediaVerdict, SentenceRecord};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use uuid::Uuid;

use crate::state::AppState;

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/analyze/sentence", post(analyze_sentence))
        .route("/analyze/article", post(analyze_article))
        .route("/analyze/image", post(analyze_image))
        .route("/analyze/video", post(analyze_video))
        .route("/analyze/video/status/:job_id", get(video_status))
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn analyze_sentence(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Vec<SentenceRecord>>, AppError> {
    metrics::counter!("biaslab_requests_total", "route" => "sentence").increment(1);

    let text = read_text_field(multipart, "text").await?;
    let records = state.analyzer.analyze_sentences(&text).await?;
    debug!(reported = records.len(), "Sentence analysis complete");

    Ok(Json(records))
}

async fn analyze_article(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ArticleVerdict>, AppError> {
    metrics::counter!("biaslab_requests_total", "route" => "article").increment(1);

    let text = read_text_field(multipart, "text").await?;
    let verdict = state.analyzer.analyze_article(&text).await?;
    debug!(
        overall_bias = ?verdict.overall_bias,
        highlights = verdict.highlights.len(),
        "Article analysis complete"
    );

    Ok(Json(verdict))
}

async fn analyze_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<MediaVerdict>, AppError> {
    metrics::counter!("biaslab_requests_total", "route" => "image").increment(1);

    let bytes = read_field(multipart, "file").await?;
    Ok(Json(state.images.analyze(&bytes).await?))
}

async fn analyze_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    metrics::counter!("biaslab_requests_total", "route" => "video").increment(1);

    let bytes = read_field(multipart, "file").await?;
    let job_id = state.jobs.enqueue(bytes.to_vec());

    Ok(Json(json!({ "job_id": job_id })))
}

async fn video_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    metrics::counter!("biaslab_requests_total", "route" => "video_status").increment(1);

    match Uuid::parse_str(&job_id).ok().and_then(|id| state.jobs.status(&id)) {
        Some(job) => Json(job).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Job ID not found" })),
        )
            .into_response(),
    }
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// First multipart field called `name`
async fn read_field(mut multipart: Multipart, name: &str) -> Result<Bytes, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Malformed form data: {e}")))?
    {
        if field.name() == Some(name) {
            return field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidRequest(format!("Failed to read field '{name}': {e}")));
        }
    }

    Err(AppError::InvalidRequest(format!(
        "Missing form field '{name}'"
    )))
}

async fn read_text_field(multipart: Multipart, name: &str) -> Result<String, AppError> {
    let bytes = read_field(multipart, name).await?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| AppError::InvalidRequest(format!("Field '{name}' is not valid UTF-8")))
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    Analysis(biaslab_core::Error),
}

impl From<biaslab_core::Error> for AppError {
    fn from(err: biaslab_core::Error) -> Self {
        AppError::Analysis(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use biaslab_core::Error;

        let (status, kind, message) = match self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request_error", msg),
            AppError::Analysis(err @ Error::Classifier(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "classifier_unavailable",
                err.to_string(),
            ),
            AppError::Analysis(err @ Error::Config(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", err.to_string())
            }
            AppError::Analysis(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string())
            }
        };

        if status.is_server_error() {
            error!(%status, %message, "Request failed");
            metrics::counter!("biaslab_errors_total", "type" => kind).increment(1);
        }

        let body = json!({
            "error": {
                "message": message,
                "type": kind,
            }
        });

        (status, Json(body)).into_response()
    }
}
