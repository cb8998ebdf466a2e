//! Ephemeral stores (Redis).
//!
//! This module contains traits and implementations for ephemeral data
//! storage. All data stored here has automatic TTL-based expiration, and
//! every store is optional: the service stays correct without Redis, only
//! slower (no cache) and less protected (per-process rate limiting).
//!
//! ## Stores
//!
//! - **marker_cache** - cache-aside query results for nearby/viewport queries
//! - **rate_limit** - registration attempt counters
//!
//! ## Redis Key Patterns
//!
//! ```text
//! cache:marker:nearby:v1:{params}   → normalized marker list JSON (short TTL)
//! cache:marker:viewport:v1:{params} → normalized marker list JSON (short TTL)
//! rl:register:{client}              → attempt counter (window TTL)
//! ```

mod marker_cache;
mod rate_limit;

pub use marker_cache::{CacheLookup, MarkerCache, RedisMarkerCache};
pub use rate_limit::{RateLimiter, SlidingWindowLimiter};

#[cfg(test)]
pub use marker_cache::MockMarkerCache;
#[cfg(test)]
pub use rate_limit::MockRateLimiter;

use std::sync::Arc;

/// Collection of all ephemeral stores.
#[derive(Clone)]
pub struct Stores {
    pub marker_cache: Arc<dyn MarkerCache>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}
