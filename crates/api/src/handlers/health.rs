//! Health check endpoint for load balancers and monitoring.
//!
//! Returns 200 OK if the service is healthy (database reachable, cache store
//! reachable or not configured), 503 Service Unavailable otherwise.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
    cache: bool,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.repos.markers.health_check().await.unwrap_or(false);
    let cache_ok = state
        .stores
        .marker_cache
        .health_check()
        .await
        .unwrap_or(false);

    let healthy = db_ok && cache_ok;

    let response = HealthResponse {
        status: if healthy { "ok" } else { "unhealthy" },
        database: db_ok,
        cache: cache_ok,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
