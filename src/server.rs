//! HTTP surface.
//!
//! Thin transport layer over the core: three endpoints mirroring the
//! service's public contract, with CORS for the local frontend.
//!
//! * `POST /refresh-news` — fetch headlines, ingest, report counts.
//! * `POST /run-news` — run the generation pipeline for a topic.
//! * `GET /health` — liveness.

use std::sync::Arc;

use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::NewsWeaveError;
use crate::ingestion::{ArticleIngestor, NewsApiClient};
use crate::pipeline::{RunStatus, StagePipeline};

/// Shared handler state. The NewsAPI client is absent when no credential is
/// configured; ingestion then fails with a configuration error, before any
/// network call.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<ArticleIngestor>,
    pub news: Option<Arc<NewsApiClient>>,
    pub pipeline: Arc<StagePipeline>,
}

#[derive(Deserialize)]
pub struct RunNewsRequest {
    pub topic: String,
}

#[derive(Serialize)]
pub struct RunNewsResponse {
    pub result: String,
}

#[derive(Serialize)]
pub struct RefreshNewsResponse {
    pub fetched: usize,
    pub indexed: usize,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

struct ApiError(NewsWeaveError);

impl From<NewsWeaveError> for ApiError {
    fn from(err: NewsWeaveError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            NewsWeaveError::Validation(_) => StatusCode::BAD_REQUEST,
            NewsWeaveError::UpstreamFetch(_) | NewsWeaveError::Inference(_) => {
                StatusCode::BAD_GATEWAY
            }
            NewsWeaveError::Configuration(_)
            | NewsWeaveError::Storage(_)
            | NewsWeaveError::Cancelled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            kind: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health))
        .route("/refresh-news", post(refresh_news))
        .route("/run-news", post(run_news))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn refresh_news(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<RefreshNewsResponse>, ApiError> {
    let news = state.news.as_ref().ok_or_else(|| {
        ApiError(NewsWeaveError::configuration("NEWSAPI_KEY is not set"))
    })?;
    let articles = news.fetch_top_headlines().await?;
    let fetched = articles.len();
    let indexed = state.ingestor.ingest(&articles).await?;
    info!(fetched, indexed, "news refresh complete");
    Ok(Json(RefreshNewsResponse { fetched, indexed }))
}

async fn run_news(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(request): Json<RunNewsRequest>,
) -> Result<Json<RunNewsResponse>, ApiError> {
    let run = state.pipeline.run(&request.topic).await?;
    match run.status {
        RunStatus::Completed => {
            let result = run.final_output.ok_or_else(|| {
                ApiError(NewsWeaveError::inference(
                    "completed run produced no final output",
                ))
            })?;
            Ok(Json(RunNewsResponse { result }))
        }
        _ => Err(ApiError(NewsWeaveError::inference(
            run.failure
                .unwrap_or_else(|| "pipeline run failed".to_string()),
        ))),
    }
}
