//! HTTP API server

use crate::actor::TrackerHandle;
use crate::display::{ActiveView, WebDisplay};
use crate::error::KeyquizError;
use crate::tracking::QuizHistory;
use crate::types::{KeywordEvent, QuizRecord, TopicRegistration, TrackingStatus};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Shared state for request handlers
#[derive(Clone)]
pub struct ApiState {
    pub tracker: TrackerHandle,
    pub display: Arc<WebDisplay>,
    pub history: Arc<QuizHistory>,
}

/// Error response mapped from [`KeyquizError`]
#[derive(Debug)]
pub struct ApiError(KeyquizError);

impl From<KeyquizError> for ApiError {
    fn from(e: KeyquizError) -> Self {
        Self(e)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            KeyquizError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            KeyquizError::TopicNotFound(_) => StatusCode::NOT_FOUND,
            KeyquizError::Display(_) => StatusCode::NOT_FOUND,
            e if e.is_backend_failure() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the API router
pub fn router(state: ApiState) -> Router {
    Router::new()
        // Keyword intake
        .route("/events", post(keyword_event_handler))
        // Tracking
        .route("/status", get(status_handler))
        .route("/topics", post(register_topic_handler))
        .route("/topics/:name", delete(remove_topic_handler))
        .route("/topics/:name/threshold", post(set_threshold_handler))
        // Quiz views
        .route("/quiz/active", get(active_quiz_handler))
        .route("/quiz/:view_id/answer", post(reveal_answer_handler))
        .route("/quiz/:view_id/close", post(close_quiz_handler))
        .route("/history", get(history_handler))
        // Health check
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// API server bound to one address
pub struct ApiServer {
    addr: SocketAddr,
    state: ApiState,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, state: ApiState) -> Self {
        Self { addr, state }
    }

    /// Serve until the process is stopped
    pub async fn serve(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("API server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, router(self.state)).await?;
        Ok(())
    }
}

/// Queue one keyword event; processing happens on the tracker actor
async fn keyword_event_handler(
    State(state): State<ApiState>,
    Json(event): Json<KeywordEvent>,
) -> ApiResult<StatusCode> {
    if event.topic.trim().is_empty() || event.keyword.trim().is_empty() {
        return Err(KeyquizError::InvalidInput("topic and keyword are required".to_string()).into());
    }
    debug!("Keyword event {:?}/{:?} x{}", event.topic, event.keyword, event.count);
    state.tracker.keyword_found(event)?;
    Ok(StatusCode::ACCEPTED)
}

async fn status_handler(State(state): State<ApiState>) -> ApiResult<Json<TrackingStatus>> {
    Ok(Json(state.tracker.check_tracking().await?))
}

async fn register_topic_handler(
    State(state): State<ApiState>,
    Json(registration): Json<TopicRegistration>,
) -> ApiResult<StatusCode> {
    state.tracker.register_topic(registration).await?;
    Ok(StatusCode::CREATED)
}

async fn remove_topic_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    if state.tracker.remove_topic(name.clone()).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(KeyquizError::TopicNotFound(name).into())
    }
}

#[derive(Debug, Deserialize)]
struct ThresholdRequest {
    threshold: u32,
}

async fn set_threshold_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<ThresholdRequest>,
) -> ApiResult<StatusCode> {
    state.tracker.set_threshold(name, req.threshold).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Most recent open quiz view, or 204 when nothing is on screen
async fn active_quiz_handler(State(state): State<ApiState>) -> Response {
    match state.display.active() {
        Some(view) => Json(view).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn reveal_answer_handler(
    State(state): State<ApiState>,
    Path(view_id): Path<Uuid>,
) -> ApiResult<Json<ActiveView>> {
    Ok(Json(state.display.reveal_answer(view_id).await?))
}

async fn close_quiz_handler(
    State(state): State<ApiState>,
    Path(view_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.display.close(view_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(KeyquizError::Display(format!("no open quiz view {}", view_id)).into())
    }
}

async fn history_handler(State(state): State<ApiState>) -> ApiResult<Json<Vec<QuizRecord>>> {
    Ok(Json(state.history.entries().await?))
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    timestamp: DateTime<Utc>,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}
