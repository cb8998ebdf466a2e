//! Domain services.
//!
//! Pure marker domain logic lives here, on top of the repos (PostgreSQL) and
//! stores (Redis) abstractions:
//!
//! - **availability** - daily open windows and the derived `is_active` flag
//! - **cache_key** - canonical keys for the geospatial query cache
//! - **category** - taxonomy normalization and legacy alias mapping
//! - **markers** - the query engine and write boundary tying it together

pub mod availability;
pub mod cache_key;
pub mod category;
pub mod markers;

pub use markers::{Editor, MarkerError, MarkerService};
