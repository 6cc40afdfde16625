//! Redis-backed cache implementation.

use super::keys::{ListKey, analytics_key, clicks_key, owner_lists_pattern, url_key};
use super::service::{CacheError, CacheResult, CacheService, CacheTtls};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::entities::{ShortUrl, UrlAnalytics, UrlPage};

/// Keys fetched per SCAN round trip when invalidating list pages.
const SCAN_BATCH: usize = 200;

/// Redis cache for URL snapshots, analytics snapshots and owner list pages.
///
/// Uses `ConnectionManager`, which reconnects transparently. All operations are
/// fail-open: errors are logged and reported as a miss or a dropped write.
pub struct RedisCache {
    client: ConnectionManager,
    ttls: CacheTtls,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ConnectionError`] if the URL is invalid, the connection cannot
    /// be established, or the PING health check fails.
    pub async fn connect(redis_url: &str, ttls: CacheTtls) -> CacheResult<Self> {
        info!("Connecting cache to Redis");

        let client = Client::open(redis_url).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("✓ Cache connected to Redis");

        Ok(Self {
            client: manager,
            ttls,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.client.clone();

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("Cache HIT: {}", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => {
                debug!("Cache MISS: {}", key);
                None
            }
            Err(e) => {
                warn!("Redis GET error for {}: {}", key, e);
                None
            }
        }
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode cache entry {}: {}", key, e);
                return;
            }
        };

        let mut conn = self.client.clone();
        match conn.set_ex::<_, _, ()>(key, raw, ttl_seconds).await {
            Ok(_) => debug!("Cache SET: {} (TTL: {}s)", key, ttl_seconds),
            Err(e) => warn!("Redis SET error for {}: {}", key, e),
        }
    }

    async fn delete(&self, key: &str) {
        let mut conn = self.client.clone();

        match conn.del::<_, i32>(key).await {
            Ok(deleted) => {
                if deleted > 0 {
                    debug!("Cache INVALIDATE: {}", key);
                }
            }
            Err(e) => warn!("Redis DEL error for {}: {}", key, e),
        }
    }

    /// Collects keys matching `pattern` with cursor-based SCAN (never KEYS).
    async fn scan_keys(&self, pattern: &str) -> redis::RedisResult<Vec<String>> {
        let mut conn = self.client.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            keys.extend(batch);
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<ShortUrl>> {
        Ok(self.get_json(&url_key(short_code)).await)
    }

    async fn set_url(&self, url: &ShortUrl) -> CacheResult<()> {
        self.set_json(&url_key(&url.short_code), url, self.ttls.url.as_secs())
            .await;
        Ok(())
    }

    async fn invalidate_url(&self, short_code: &str) -> CacheResult<()> {
        self.delete(&url_key(short_code)).await;
        Ok(())
    }

    async fn get_analytics(&self, url_id: Uuid) -> CacheResult<Option<UrlAnalytics>> {
        Ok(self.get_json(&analytics_key(url_id)).await)
    }

    async fn set_analytics(&self, analytics: &UrlAnalytics) -> CacheResult<()> {
        self.set_json(
            &analytics_key(analytics.url.id),
            analytics,
            self.ttls.analytics.as_secs(),
        )
        .await;
        Ok(())
    }

    async fn invalidate_analytics(&self, url_id: Uuid) -> CacheResult<()> {
        self.delete(&analytics_key(url_id)).await;
        Ok(())
    }

    async fn get_owner_list(&self, key: &ListKey) -> CacheResult<Option<UrlPage>> {
        Ok(self.get_json(&key.render()).await)
    }

    async fn set_owner_list(&self, key: &ListKey, page: &UrlPage) -> CacheResult<()> {
        self.set_json(&key.render(), page, self.ttls.list.as_secs())
            .await;
        Ok(())
    }

    async fn invalidate_owner_lists(&self, owner_id: &str) -> CacheResult<()> {
        let pattern = owner_lists_pattern(owner_id);

        let keys = match self.scan_keys(&pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Redis SCAN error for {}: {}", pattern, e);
                return Ok(());
            }
        };

        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.client.clone();
        match conn.del::<_, i32>(&keys).await {
            Ok(deleted) => debug!("Cache INVALIDATE: {} list pages for {}", deleted, owner_id),
            Err(e) => warn!("Redis DEL error for {}: {}", pattern, e),
        }
        Ok(())
    }

    async fn increment_cached_clicks(&self, short_code: &str) -> CacheResult<()> {
        let mut conn = self.client.clone();

        if let Err(e) = conn.incr::<_, _, i64>(clicks_key(short_code), 1).await {
            warn!("Redis INCR error for {}: {}", short_code, e);
            return Ok(());
        }

        // Read-modify-write of the snapshot; concurrent redirects may lose an
        // increment here, the store counter stays exact.
        let key = url_key(short_code);
        if let Some(mut snapshot) = self.get_json::<ShortUrl>(&key).await {
            snapshot.clicks += 1;
            let raw = serde_json::to_string(&snapshot)?;
            let result: redis::RedisResult<()> = redis::cmd("SET")
                .arg(&key)
                .arg(raw)
                .arg("KEEPTTL")
                .arg("XX")
                .query_async(&mut conn)
                .await;
            if let Err(e) = result {
                warn!("Redis SET error for {}: {}", key, e);
            }
        }

        Ok(())
    }

    async fn cached_click_count(&self, short_code: &str) -> CacheResult<u64> {
        let mut conn = self.client.clone();

        match conn.get::<_, Option<u64>>(clicks_key(short_code)).await {
            Ok(count) => Ok(count.unwrap_or(0)),
            Err(e) => {
                warn!("Redis GET error for clicks of {}: {}", short_code, e);
                Ok(0)
            }
        }
    }

    async fn reset_cached_clicks(&self, short_code: &str) -> CacheResult<()> {
        self.delete(&clicks_key(short_code)).await;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
