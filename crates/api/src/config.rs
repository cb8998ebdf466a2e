use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Redis URL for the query cache and rate-limit counters. Optional: the
    /// service runs without it, only slower (no cache) and with per-process
    /// rate limiting.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Master switch for the marker query cache.
    #[serde(default = "default_true")]
    pub marker_cache_enabled: bool,
    #[serde(default = "default_nearby_ttl")]
    pub nearby_cache_ttl_seconds: u64,
    #[serde(default = "default_viewport_ttl")]
    pub viewport_cache_ttl_seconds: u64,
    /// Use Redis for registration rate limiting when available.
    #[serde(default = "default_true")]
    pub register_rate_limit_redis_enabled: bool,
    #[serde(default = "default_register_max_attempts")]
    pub register_max_attempts: u32,
    #[serde(default = "default_register_window_seconds")]
    pub register_window_seconds: u64,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking.
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

fn default_true() -> bool {
    true
}

fn default_nearby_ttl() -> u64 {
    12
}

fn default_viewport_ttl() -> u64 {
    10
}

fn default_register_max_attempts() -> u32 {
    5
}

fn default_register_window_seconds() -> u64 {
    600
}
