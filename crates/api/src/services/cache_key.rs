//! Canonical cache keys for geospatial queries.
//!
//! Semantically identical queries must hit the same key: coordinates are
//! fixed to 4 decimal places (~11 m) so float noise does not fragment the
//! cache, and viewport category filters are sorted and deduplicated so the
//! caller's ordering is irrelevant.

use super::category::Category;

const NEARBY_PREFIX: &str = "cache:marker:nearby:v1:";
const VIEWPORT_PREFIX: &str = "cache:marker:viewport:v1:";

/// Key for a radius-from-point query. `radius_meters` must already be
/// clamped; the clamp happens once, before key construction and execution.
pub fn nearby(lat: f64, lng: f64, radius_meters: i32, category: Category) -> String {
    format!(
        "{}lat={}|lng={}|r={}|c={}",
        NEARBY_PREFIX,
        round(lat),
        round(lng),
        radius_meters,
        category.as_str()
    )
}

/// Key for a bounding-box query. An empty filter is the literal "all".
pub fn viewport(
    min_lat: f64,
    max_lat: f64,
    min_lng: f64,
    max_lng: f64,
    categories: &[Category],
) -> String {
    let category_part = if categories.is_empty() {
        "all".to_string()
    } else {
        let mut names: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names.join(",")
    };

    format!(
        "{}minLat={}|maxLat={}|minLng={}|maxLng={}|cat={}",
        VIEWPORT_PREFIX,
        round(min_lat),
        round(max_lat),
        round(min_lng),
        round(max_lng),
        category_part
    )
}

fn round(value: f64) -> String {
    format!("{value:.4}")
}
