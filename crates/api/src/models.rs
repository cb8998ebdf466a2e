use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Moderation states (PENDING/APPROVED/REJECTED). Markers enter as PENDING
/// and only surface in public queries once APPROVED; the moderation workflow
/// itself lives in the admin service.
pub const REVIEW_PENDING: &str = "PENDING";
pub const REVIEW_APPROVED: &str = "APPROVED";

/// A geolocated point of interest.
///
/// `is_active` is derived from the open-time window and is recomputed at
/// every read boundary and immediately before every write; the stored value
/// is a denormalization for query-time filtering, not a source of truth.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Marker {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
    pub category: String,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    /// Username of the creator.
    pub username: String,
    /// Public id of the creator, used for ownership checks.
    pub user_public_id: Option<String>,
    pub is_active: bool,
    /// Daily open window ("HH:MM"); both None means always open.
    pub open_time_start: Option<String>,
    pub open_time_end: Option<String>,
    pub review_status: String,
    pub last_edited_by: Option<String>,
    pub last_edited_by_public_id: Option<String>,
    pub last_edited_by_owner: bool,
    /// URL of the marker image, if one was uploaded.
    pub mark_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub public_id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
