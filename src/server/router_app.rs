use crate::models::ApiResponse;
use crate::router::{ForwardError, Router as SearchRouter};
use crate::server::coordinator_app::{validate_params, SearchParams};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use uuid::Uuid;

/// HTTP surface of the router tier.
pub fn router_app(router: Arc<SearchRouter>) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/ready", get(ready))
        .route("/health", get(health))
        .route("/_router/state", get(router_state))
        .with_state(router)
}

async fn search(
    State(router): State<Arc<SearchRouter>>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = validate_params(&params) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(err.to_api_error())),
        )
            .into_response();
    }

    // pass through the client's request id or mint one
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(new_request_id);

    match router
        .forward_search(
            &params.q,
            params.page,
            params.page_size,
            params.debug,
            &request_id,
        )
        .await
    {
        Ok((status, body, coordinator)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            [
                ("x-request-id", request_id),
                ("x-routed-to", coordinator),
            ],
            Json(body),
        )
            .into_response(),
        Err(ForwardError::NoCoordinators) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "error": "no coordinators are ready",
            })),
        )
            .into_response(),
        Err(ForwardError::AllAttemptsFailed(last_err)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unavailable",
                "error": format!("all routing attempts failed: {last_err}"),
                "request_id": request_id,
            })),
        )
            .into_response(),
    }
}

async fn ready(State(router): State<Arc<SearchRouter>>) -> (StatusCode, Json<serde_json::Value>) {
    if router.any_ready() {
        (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ready"})),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "not ready"})),
        )
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn router_state(State(router): State<Arc<SearchRouter>>) -> Json<serde_json::Value> {
    Json(router.state_dump())
}

fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}
