//! Marker repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::models::Marker;

/// Repository for marker persistence and spatial queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarkerRepo: Send + Sync {
    /// Health check - verify database connectivity.
    async fn health_check(&self) -> Result<bool>;

    /// All publicly visible, moderation-approved markers.
    async fn find_public_approved(&self) -> Result<Vec<Marker>>;

    /// Case-insensitive substring match over title, description, category
    /// and the textual form of the coordinates. Public+approved only.
    async fn search_text(&self, query: &str) -> Result<Vec<Marker>>;

    /// Markers within ±eps degrees of a point. Public+approved only.
    async fn find_near_point(&self, lat: f64, lng: f64, eps: f64) -> Result<Vec<Marker>>;

    /// Markers of one category within a geodesic radius, nearest first.
    /// Requires PostGIS.
    async fn find_within_radius(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: i32,
        category: &str,
    ) -> Result<Vec<Marker>>;

    /// Markers inside a bounding box, optionally restricted to a category
    /// set. Public+approved only.
    async fn find_within_bounds(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
        categories: Option<Vec<String>>,
    ) -> Result<Vec<Marker>>;

    /// Find a marker by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Marker>>;

    /// Insert a new marker, returning the stored row.
    async fn create(&self, marker: &Marker) -> Result<Marker>;

    /// Persist field changes to an existing marker, returning the stored row.
    async fn save(&self, marker: &Marker) -> Result<Marker>;

    /// Delete a marker by id (returns true if it existed).
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// PostgreSQL implementation of MarkerRepo.
#[derive(Clone)]
pub struct PgMarkerRepo {
    pool: Pool<Postgres>,
}

impl PgMarkerRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarkerRepo for PgMarkerRepo {
    async fn health_check(&self) -> Result<bool> {
        let result: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(result == 1)
    }

    async fn find_public_approved(&self) -> Result<Vec<Marker>> {
        let markers = sqlx::query_as::<_, Marker>(
            "SELECT * FROM map_markers WHERE is_public AND review_status = 'APPROVED'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(markers)
    }

    async fn search_text(&self, query: &str) -> Result<Vec<Marker>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let markers = sqlx::query_as::<_, Marker>(
            r#"
            SELECT * FROM map_markers
            WHERE is_public AND review_status = 'APPROVED'
              AND (
                lower(title) LIKE $1
                OR lower(description) LIKE $1
                OR lower(category) LIKE $1
                OR lat::text LIKE $1
                OR lng::text LIKE $1
              )
            "#,
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(markers)
    }

    async fn find_near_point(&self, lat: f64, lng: f64, eps: f64) -> Result<Vec<Marker>> {
        let markers = sqlx::query_as::<_, Marker>(
            r#"
            SELECT * FROM map_markers
            WHERE is_public AND review_status = 'APPROVED'
              AND abs(lat - $1) <= $3
              AND abs(lng - $2) <= $3
            "#,
        )
        .bind(lat)
        .bind(lng)
        .bind(eps)
        .fetch_all(&self.pool)
        .await?;
        Ok(markers)
    }

    async fn find_within_radius(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: i32,
        category: &str,
    ) -> Result<Vec<Marker>> {
        let markers = sqlx::query_as::<_, Marker>(
            r#"
            SELECT * FROM map_markers
            WHERE is_public AND review_status = 'APPROVED'
              AND category = $4
              AND ST_DWithin(
                ST_SetSRID(ST_MakePoint(lng, lat), 4326)::geography,
                ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography,
                $3
              )
            ORDER BY ST_Distance(
              ST_SetSRID(ST_MakePoint(lng, lat), 4326)::geography,
              ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography
            ) ASC
            "#,
        )
        .bind(lat)
        .bind(lng)
        .bind(f64::from(radius_meters))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(markers)
    }

    async fn find_within_bounds(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
        categories: Option<Vec<String>>,
    ) -> Result<Vec<Marker>> {
        let markers = match categories {
            Some(categories) => {
                sqlx::query_as::<_, Marker>(
                    r#"
                    SELECT * FROM map_markers
                    WHERE is_public AND review_status = 'APPROVED'
                      AND lat BETWEEN $1 AND $2
                      AND lng BETWEEN $3 AND $4
                      AND category = ANY($5)
                    "#,
                )
                .bind(min_lat)
                .bind(max_lat)
                .bind(min_lng)
                .bind(max_lng)
                .bind(categories)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Marker>(
                    r#"
                    SELECT * FROM map_markers
                    WHERE is_public AND review_status = 'APPROVED'
                      AND lat BETWEEN $1 AND $2
                      AND lng BETWEEN $3 AND $4
                    "#,
                )
                .bind(min_lat)
                .bind(max_lat)
                .bind(min_lng)
                .bind(max_lng)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(markers)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Marker>> {
        let marker = sqlx::query_as::<_, Marker>("SELECT * FROM map_markers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(marker)
    }

    async fn create(&self, marker: &Marker) -> Result<Marker> {
        let created = sqlx::query_as::<_, Marker>(
            r#"
            INSERT INTO map_markers (
                lat, lng, category, title, description, is_public, username,
                user_public_id, is_active, open_time_start, open_time_end,
                review_status, last_edited_by, last_edited_by_public_id,
                last_edited_by_owner, mark_image
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(marker.lat)
        .bind(marker.lng)
        .bind(&marker.category)
        .bind(&marker.title)
        .bind(&marker.description)
        .bind(marker.is_public)
        .bind(&marker.username)
        .bind(&marker.user_public_id)
        .bind(marker.is_active)
        .bind(&marker.open_time_start)
        .bind(&marker.open_time_end)
        .bind(&marker.review_status)
        .bind(&marker.last_edited_by)
        .bind(&marker.last_edited_by_public_id)
        .bind(marker.last_edited_by_owner)
        .bind(&marker.mark_image)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn save(&self, marker: &Marker) -> Result<Marker> {
        let saved = sqlx::query_as::<_, Marker>(
            r#"
            UPDATE map_markers SET
                lat = $2, lng = $3, category = $4, title = $5, description = $6,
                is_public = $7, is_active = $8, open_time_start = $9,
                open_time_end = $10, review_status = $11, last_edited_by = $12,
                last_edited_by_public_id = $13, last_edited_by_owner = $14,
                mark_image = $15, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(marker.id)
        .bind(marker.lat)
        .bind(marker.lng)
        .bind(&marker.category)
        .bind(&marker.title)
        .bind(&marker.description)
        .bind(marker.is_public)
        .bind(marker.is_active)
        .bind(&marker.open_time_start)
        .bind(&marker.open_time_end)
        .bind(&marker.review_status)
        .bind(&marker.last_edited_by)
        .bind(&marker.last_edited_by_public_id)
        .bind(marker.last_edited_by_owner)
        .bind(&marker.mark_image)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM map_markers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
