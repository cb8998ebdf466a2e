//! Shared test utilities for API handler tests.
//!
//! Provides common mock factories and a flexible `TestStateBuilder` for
//! constructing `AppState` instances with only the mocks needed for each
//! test.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStateBuilder, mock_marker};
//!
//! let mut marker_repo = MockMarkerRepo::new();
//! marker_repo.expect_find_by_id().returning(|_| Ok(Some(mock_marker(1, "friendly_clinic"))));
//!
//! let state = TestStateBuilder::new()
//!     .with_marker_repo(marker_repo)
//!     .build();
//! ```

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{Marker, REVIEW_APPROVED, User};
use crate::repos::{MockMarkerRepo, MockUserRepo, Repos};
use crate::state::AppState;
use crate::stores::{CacheLookup, MockMarkerCache, MockRateLimiter, Stores};

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        database_url: "postgres://test".to_string(),
        redis_url: None,
        marker_cache_enabled: true,
        nearby_cache_ttl_seconds: 12,
        viewport_cache_ttl_seconds: 10,
        register_rate_limit_redis_enabled: false,
        register_max_attempts: 5,
        register_window_seconds: 600,
        env: "test".to_string(),
        sentry_dsn: None,
    }
}

/// Creates an approved public marker owned by "alice" / "user-public-id".
pub fn mock_marker(id: i64, category: &str) -> Marker {
    Marker {
        id,
        lat: 31.2304,
        lng: 121.4737,
        category: category.to_string(),
        title: format!("Marker {id}"),
        description: None,
        is_public: true,
        username: "alice".to_string(),
        user_public_id: Some("user-public-id".to_string()),
        is_active: true,
        open_time_start: None,
        open_time_end: None,
        review_status: REVIEW_APPROVED.to_string(),
        last_edited_by: Some("alice".to_string()),
        last_edited_by_public_id: Some("user-public-id".to_string()),
        last_edited_by_owner: true,
        mark_image: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Creates a mock user with the given username.
pub fn mock_user(username: &str) -> User {
    User {
        id: 1,
        public_id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        created_at: Utc::now(),
    }
}

/// Builder for constructing test `AppState` with custom mocks.
///
/// Uses default mocks for anything not explicitly set: an always-missing
/// cache and otherwise empty mocks, so tests only configure what they use.
pub struct TestStateBuilder {
    marker_repo: Option<MockMarkerRepo>,
    user_repo: Option<MockUserRepo>,
    marker_cache: Option<MockMarkerCache>,
    rate_limiter: Option<MockRateLimiter>,
}

impl TestStateBuilder {
    /// Creates a new builder with no mocks configured.
    pub fn new() -> Self {
        Self {
            marker_repo: None,
            user_repo: None,
            marker_cache: None,
            rate_limiter: None,
        }
    }

    pub fn with_marker_repo(mut self, repo: MockMarkerRepo) -> Self {
        self.marker_repo = Some(repo);
        self
    }

    pub fn with_user_repo(mut self, repo: MockUserRepo) -> Self {
        self.user_repo = Some(repo);
        self
    }

    #[allow(dead_code)]
    pub fn with_marker_cache(mut self, cache: MockMarkerCache) -> Self {
        self.marker_cache = Some(cache);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: MockRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Builds the `AppState` using configured mocks or defaults.
    pub fn build(self) -> AppState {
        let repos = Repos {
            markers: Arc::new(self.marker_repo.unwrap_or_else(MockMarkerRepo::new)),
            users: Arc::new(self.user_repo.unwrap_or_else(MockUserRepo::new)),
        };

        let stores = Stores {
            marker_cache: Arc::new(self.marker_cache.unwrap_or_else(default_marker_cache)),
            rate_limiter: Arc::new(self.rate_limiter.unwrap_or_else(MockRateLimiter::new)),
        };

        AppState::new(test_config(), repos, stores)
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a default cache mock that always misses and accepts writes.
fn default_marker_cache() -> MockMarkerCache {
    let mut cache = MockMarkerCache::new();
    cache.expect_get().returning(|_| CacheLookup::Miss);
    cache.expect_put().returning(|_, _, _| ());
    cache
}
