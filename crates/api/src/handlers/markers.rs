//! Marker discovery and editing endpoints.
//!
//! ## Query shapes
//!
//! - GET /public   - every public, approved marker (uncached)
//! - GET /search   - free-text search; coordinate-shaped queries also match
//!   markers near that point
//! - GET /nearby   - radius from a point, nearest first (cached, PostGIS)
//! - GET /viewport - bounding box with optional category filter (cached)
//!
//! Nearby and viewport results are cached in Redis under canonical keys with
//! short TTLs; writes do not invalidate the cache (staleness is bounded by
//! the TTL).
//!
//! ## Write path
//!
//! - POST /        - create (gateway identity required, enters moderation)
//! - PATCH /{id}   - partial edit, resets moderation status
//! - DELETE /{id}  - owner-only delete

use axum::{
    Json, Router, debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use garde::Validate;
use serde::Deserialize;
use waymark_shared::api::{CreateMarkerPayload, UpdateMarkerPayload};

use crate::{
    error::AppError,
    middleware::AuthUser,
    services::{Editor, MarkerError},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/public", get(list_public))
        .route("/search", get(search))
        .route("/nearby", get(nearby))
        .route("/viewport", get(viewport))
        .route("/", post(create_marker))
        .route("/{id}", patch(update_marker).delete(delete_marker))
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

fn default_radius() -> i32 {
    1000
}

fn default_category() -> String {
    "accessible_toilet".to_string()
}

#[derive(Deserialize)]
struct NearbyParams {
    lat: f64,
    lng: f64,
    #[serde(default = "default_radius")]
    radius: i32,
    #[serde(default = "default_category")]
    category: String,
}

#[derive(Deserialize)]
struct ViewportParams {
    min_lat: f64,
    max_lat: f64,
    min_lng: f64,
    max_lng: f64,
    /// Comma-separated category filter.
    categories: Option<String>,
}

#[debug_handler]
async fn list_public(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let markers = state.markers.list_public().await.map_err(marker_error)?;
    Ok(Json(markers))
}

#[debug_handler]
async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let markers = state.markers.search(&params.q).await.map_err(marker_error)?;
    Ok(Json(markers))
}

#[debug_handler]
async fn nearby(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<impl IntoResponse, AppError> {
    let markers = state
        .markers
        .nearby(params.lat, params.lng, params.radius, &params.category)
        .await
        .map_err(marker_error)?;
    Ok(Json(markers))
}

#[debug_handler]
async fn viewport(
    State(state): State<AppState>,
    Query(params): Query<ViewportParams>,
) -> Result<impl IntoResponse, AppError> {
    let categories: Vec<String> = params
        .categories
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect();

    let markers = state
        .markers
        .viewport(
            params.min_lat,
            params.max_lat,
            params.min_lng,
            params.max_lng,
            &categories,
        )
        .await
        .map_err(marker_error)?;
    Ok(Json(markers))
}

#[debug_handler]
async fn create_marker(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateMarkerPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let editor = Editor {
        public_id: user.public_id,
        username: user.username,
    };
    let marker = state
        .markers
        .create(&editor, &payload)
        .await
        .map_err(marker_error)?;

    tracing::info!(marker_id = marker.id, user_id = %editor.public_id, "marker created");

    Ok((StatusCode::CREATED, Json(marker)))
}

#[debug_handler]
async fn update_marker(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateMarkerPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let editor = Editor {
        public_id: user.public_id,
        username: user.username,
    };

    match state
        .markers
        .update(id, &editor, &payload)
        .await
        .map_err(marker_error)?
    {
        Some(marker) => {
            tracing::info!(marker_id = id, user_id = %editor.public_id, "marker updated");
            Ok(Json(marker))
        }
        None => Err(AppError::External(StatusCode::NOT_FOUND, "Marker not found")),
    }
}

/// Deletes a marker. Only the creator can delete their own markers.
#[debug_handler]
async fn delete_marker(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let marker = state
        .markers
        .get(id)
        .await
        .map_err(marker_error)?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "Marker not found"))?;

    if marker.user_public_id.as_deref() != Some(user.public_id.as_str()) {
        return Err(AppError::External(
            StatusCode::FORBIDDEN,
            "Not authorized to delete this marker",
        ));
    }

    state.markers.delete(id).await.map_err(marker_error)?;

    tracing::info!(marker_id = id, user_id = %user.public_id, "marker deleted");

    Ok(StatusCode::OK)
}

/// Maps domain failures onto HTTP responses. Store outages never reach this
/// point; they are absorbed inside the cache and rate-limit layers.
fn marker_error(err: MarkerError) -> AppError {
    match err {
        MarkerError::Repo(err) => AppError::Internal(err),
        MarkerError::SpatialSupportMissing => AppError::External(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Spatial queries require the PostGIS extension; run CREATE EXTENSION postgis",
        ),
        err => AppError::Validation(err.to_string()),
    }
}
