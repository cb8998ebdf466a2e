//! Cache-aside storage for marker query results.

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

use crate::models::Marker;

/// Outcome of a cache lookup. Store failures are a distinct variant so the
/// caller's degrade-to-miss policy is applied at the call site, in one
/// visible place, instead of being buried in a catch-all here.
#[derive(Debug)]
pub enum CacheLookup {
    Hit(Vec<Marker>),
    Miss,
    StoreError,
}

/// Store for marker query result lists.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarkerCache: Send + Sync {
    /// Health check - verify the cache store is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Look up a cached result list.
    async fn get(&self, key: &str) -> CacheLookup;

    /// Best-effort write with TTL; failures are logged, never surfaced.
    async fn put(&self, key: &str, markers: &[Marker], ttl_secs: u64);
}

/// Redis implementation of MarkerCache.
///
/// Both a missing client and a disabled flag degrade every lookup to a
/// permanent miss with a no-op put.
#[derive(Clone)]
pub struct RedisMarkerCache {
    client: Option<redis::Client>,
    enabled: bool,
}

impl RedisMarkerCache {
    pub fn new(client: Option<redis::Client>, enabled: bool) -> Self {
        Self { client, enabled }
    }

    fn active_client(&self) -> Option<&redis::Client> {
        if self.enabled { self.client.as_ref() } else { None }
    }

    async fn try_get(&self, client: &redis::Client, key: &str) -> Result<Option<Vec<Marker>>> {
        let mut conn = client.get_multiplexed_async_connection().await?;

        let json: Option<String> = conn.get(key).await?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn try_put(
        &self,
        client: &redis::Client,
        key: &str,
        markers: &[Marker],
        ttl_secs: u64,
    ) -> Result<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(markers)?;

        let _: () = conn.set_ex(key, json, ttl_secs).await?;

        Ok(())
    }
}

#[async_trait]
impl MarkerCache for RedisMarkerCache {
    async fn health_check(&self) -> Result<bool> {
        let Some(client) = self.client.as_ref() else {
            // No store configured: nothing to be unhealthy.
            return Ok(true);
        };
        let mut conn = client.get_multiplexed_async_connection().await?;
        let result: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(result == "PONG")
    }

    async fn get(&self, key: &str) -> CacheLookup {
        let Some(client) = self.active_client() else {
            return CacheLookup::Miss;
        };

        match self.try_get(client, key).await {
            Ok(Some(markers)) => CacheLookup::Hit(markers),
            Ok(None) => CacheLookup::Miss,
            Err(err) => {
                tracing::debug!(key, error = ?err, "marker cache read failed");
                CacheLookup::StoreError
            }
        }
    }

    async fn put(&self, key: &str, markers: &[Marker], ttl_secs: u64) {
        let Some(client) = self.active_client() else {
            return;
        };

        // Zero-configured TTLs still have to expire.
        let ttl = ttl_secs.max(1);

        if let Err(err) = self.try_put(client, key, markers, ttl).await {
            tracing::debug!(key, error = ?err, "marker cache write failed");
        }
    }
}
