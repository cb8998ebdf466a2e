//! Sliding-window rate limiting for registration.
//!
//! The primary strategy is a shared Redis counter with a window expiry, so
//! the limit holds across instances. When the store is unreachable the
//! limiter degrades to a per-process sliding window instead of failing
//! closed; the caller only ever sees an allow/deny boolean.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

/// Admission control for a sensitive write operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Returns true while the caller identified by `client_key` is within
    /// its attempt budget for the trailing window.
    async fn try_acquire(&self, client_key: &str) -> bool;
}

/// Count-based sliding window: Redis `INCR` + `EXPIRE` primary, in-process
/// per-key timestamp deques as fallback.
pub struct SlidingWindowLimiter {
    redis: Option<redis::Client>,
    redis_enabled: bool,
    max_attempts: u32,
    window_seconds: u64,
    attempts: Mutex<HashMap<String, Arc<Mutex<VecDeque<u64>>>>>,
}

impl SlidingWindowLimiter {
    pub fn new(
        redis: Option<redis::Client>,
        redis_enabled: bool,
        max_attempts: u32,
        window_seconds: u64,
    ) -> Self {
        Self {
            redis,
            redis_enabled,
            max_attempts: max_attempts.max(1),
            window_seconds: window_seconds.max(1),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn redis_key(client_key: &str) -> String {
        format!("rl:register:{client_key}")
    }

    async fn check_redis(&self, client: &redis::Client, client_key: &str) -> anyhow::Result<bool> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let key = Self::redis_key(client_key);

        let count: i64 = redis::cmd("INCR").arg(&key).query_async(&mut conn).await?;

        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(self.window_seconds)
                .query_async(&mut conn)
                .await?;
        }

        Ok(count <= i64::from(self.max_attempts))
    }

    /// Local sliding window: prune attempts older than the window, admit if
    /// the remaining count is under the budget, record the attempt.
    /// Prune-then-append is a single critical section per key.
    fn check_local(&self, client_key: &str, now_millis: u64) -> bool {
        let entry = {
            let mut attempts = self.attempts.lock().expect("rate limit map poisoned");
            Arc::clone(attempts.entry(client_key.to_string()).or_default())
        };

        let mut deque = entry.lock().expect("rate limit entry poisoned");
        let threshold = now_millis.saturating_sub(self.window_seconds * 1000);
        while deque.front().is_some_and(|&t| t < threshold) {
            deque.pop_front();
        }

        if deque.len() >= self.max_attempts as usize {
            return false;
        }
        deque.push_back(now_millis);
        true
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn try_acquire(&self, client_key: &str) -> bool {
        let key = client_key.trim();
        let key = if key.is_empty() { "unknown" } else { key };

        if self.redis_enabled && let Some(client) = &self.redis {
            match self.check_redis(client, key).await {
                Ok(allowed) => return allowed,
                Err(err) => {
                    tracing::warn!(error = ?err, "rate limit store unavailable, using local fallback");
                }
            }
        }

        self.check_local(key, now_millis())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
