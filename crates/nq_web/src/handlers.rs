use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use nq_core::{DateRange, Error, Query, ScoredCandidate};
use nq_inference::pipeline::Status;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub status: Status,
    pub articles: Vec<ScoredCandidate>,
}

pub async fn home() -> impl IntoResponse {
    Json(json!({ "message": "Bienvenue sur l'API de l'Assistant Médias 24" }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(pipeline) = &state.pipeline else {
        let message = state.unavailable.clone().unwrap_or_default();
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "error", "message": message })));
    };

    match pipeline.store().health().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy", "backend": "connected" }))),
        Err(e @ (Error::SearchUnavailable(_) | Error::DataLoadFailed(_))) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "backend": "error", "message": e.to_string() })),
        ),
        Err(e) => {
            warn!("Health check could not reach {}: {}", pipeline.store().name(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
        }
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> axum::response::Response {
    if request.text.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Query is required" }))).into_response();
    }

    let Some(pipeline) = &state.pipeline else {
        let message = state.unavailable.clone().unwrap_or_default();
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": message }))).into_response();
    };

    let mut query = Query::new(request.text).with_range(DateRange::new(request.start, request.end));
    query.limit = request.limit;

    info!("💬 Question received: {}", query.text);
    let response = pipeline.answer(&query).await;

    Json(ChatResponse {
        response: response.answer,
        status: response.status,
        articles: response.sources,
    })
    .into_response()
}
