use crate::errors::SearchError;
use crate::models::{ApiResponse, InternalSearchRequest, SearchResponse};
use crate::search::shard::ShardNode;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

/// Internal HTTP surface of one shard replica.
pub fn shard_app(node: Arc<ShardNode>) -> Router {
    Router::new()
        .route("/internal/search", post(internal_search))
        .route("/internal/ready", get(internal_ready))
        .route("/internal/health", get(internal_health))
        .with_state(node)
}

type ErrorReply = (StatusCode, Json<ApiResponse<SearchResponse>>);

fn domain_error(err: &SearchError) -> ErrorReply {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(err.to_api_error())),
    )
}

async fn internal_search(
    State(node): State<Arc<ShardNode>>,
    Json(body): Json<InternalSearchRequest>,
) -> Result<Json<SearchResponse>, ErrorReply> {
    // per-query scoring is CPU-bound but lock-free over the read-only
    // index, so it runs on the blocking pool
    let worker = tokio::task::spawn_blocking(move || {
        node.search(&body.q, body.page, body.page_size, body.debug)
    });

    match worker.await {
        Ok(Ok(response)) => Ok(Json(response)),
        Ok(Err(err)) => Err(domain_error(&err)),
        Err(join_err) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(crate::models::ApiError {
                code: "SEARCH_ERROR".to_string(),
                message: format!("search task failed: {join_err}"),
                details: None,
            })),
        )),
    }
}

async fn internal_ready(
    State(node): State<Arc<ShardNode>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if node.is_ready() {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "shard_id": node.shard_id(),
                "replica_id": node.replica_id(),
                "total_documents": node.total_documents(),
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "not ready"})),
        )
    }
}

async fn internal_health(State(node): State<Arc<ShardNode>>) -> Json<serde_json::Value> {
    Json(node.health())
}
