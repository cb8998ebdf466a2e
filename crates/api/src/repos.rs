//! Database repositories (PostgreSQL).
//!
//! This module contains traits and implementations for database access.
//! Each repository is abstracted behind a trait to enable mocking in tests.
//!
//! ## Repositories
//!
//! - **markers** - marker CRUD and the spatial query shapes
//! - **users** - minimal registration surface
//!
//! ## Usage in Handlers
//!
//! Repositories are accessed via `state.repos` (or, for markers, through the
//! `MarkerService` on `state.markers`):
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let user = state.repos.users.create(&username, &email).await?;
//! }
//! ```

mod markers;
mod users;

pub use markers::{MarkerRepo, PgMarkerRepo};
pub use users::{PgUserRepo, UserRepo};

#[cfg(test)]
pub use markers::MockMarkerRepo;
#[cfg(test)]
pub use users::MockUserRepo;

use std::sync::Arc;

/// Collection of all database repositories.
#[derive(Clone)]
pub struct Repos {
    pub markers: Arc<dyn MarkerRepo>,
    pub users: Arc<dyn UserRepo>,
}
