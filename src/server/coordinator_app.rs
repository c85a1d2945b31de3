use crate::coordinator::Coordinator;
use crate::errors::SearchError;
use crate::models::{ApiResponse, SearchResponse};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

const QUERY_MIN_LEN: usize = 2;
const QUERY_MAX_LEN: usize = 100;
const PAGE_SIZE_MAX: usize = 50;

/// Public HTTP surface of the coordinator.
pub fn coordinator_app(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/ready", get(ready))
        .route("/health", get(health))
        .with_state(coordinator)
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub debug: bool,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

/// Enforces the public query constraints: `2 <= |q| <= 100`, `page >= 1`,
/// `1 <= page_size <= 50`.
pub fn validate_params(params: &SearchParams) -> Result<(), SearchError> {
    let q_len = params.q.chars().count();
    if !(QUERY_MIN_LEN..=QUERY_MAX_LEN).contains(&q_len) {
        return Err(SearchError::invalid_query(serde_json::json!({
            "q": params.q,
            "constraint": format!("query length must be within {QUERY_MIN_LEN}..={QUERY_MAX_LEN}"),
        })));
    }
    if params.page < 1 {
        return Err(SearchError::invalid_query(serde_json::json!({
            "page": params.page
        })));
    }
    if !(1..=PAGE_SIZE_MAX).contains(&params.page_size) {
        return Err(SearchError::invalid_query(serde_json::json!({
            "page_size": params.page_size
        })));
    }
    Ok(())
}

async fn search(
    State(coordinator): State<Arc<Coordinator>>,
    Query(params): Query<SearchParams>,
) -> (StatusCode, Json<ApiResponse<SearchResponse>>) {
    if let Err(err) = validate_params(&params) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(err.to_api_error())),
        );
    }

    let response = coordinator
        .search(&params.q, params.page, params.page_size, params.debug)
        .await;

    // an all-shards-failed fan-out still answers 200 with status
    // "partial" and an empty result page
    (StatusCode::OK, Json(response))
}

async fn ready(
    State(coordinator): State<Arc<Coordinator>>,
) -> (StatusCode, Json<serde_json::Value>) {
    match coordinator.readiness() {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ready"})),
        ),
        Err(details) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "details": details,
            })),
        ),
    }
}

async fn health() -> Json<serde_json::Value> {
    // liveness is unconditional; readiness carries the real signal
    Json(serde_json::json!({"status": "ok"}))
}
