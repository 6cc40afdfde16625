//! In-process cache implementation.

use super::keys::{ListKey, analytics_key, clicks_key, owner_lists_prefix, url_key};
use super::service::{CacheResult, CacheService, CacheTtls};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::{ShortUrl, UrlAnalytics, UrlPage};

struct Entry {
    raw: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Cache kept in process memory with the same key layout and TTL rules as
/// [`super::RedisCache`].
///
/// Values are stored JSON-encoded, so readers always get an independent
/// snapshot. Expiry follows the tokio clock, which lets tests advance time.
/// [`MemoryCache::set_available`] simulates an unreachable backend.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttls: CacheTtls,
    available: AtomicBool,
}

impl MemoryCache {
    pub fn new(ttls: CacheTtls) -> Self {
        debug!("Using MemoryCache");
        Self {
            entries: Mutex::new(HashMap::new()),
            ttls,
            available: AtomicBool::new(true),
        }
    }

    /// Toggles simulated reachability. While unavailable every read misses and
    /// every write is dropped.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live entries, for assertions.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        if !self.is_available() {
            return None;
        }

        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.raw.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put_raw(&self, key: String, raw: String, ttl: Option<Duration>) {
        if !self.is_available() {
            return;
        }

        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.lock().insert(key, Entry { raw, expires_at });
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.get_raw(key) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: String, value: &T, ttl: Duration) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.put_raw(key, raw, Some(ttl));
        Ok(())
    }

    fn remove(&self, key: &str) {
        if self.is_available() {
            self.lock().remove(key);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheTtls::default())
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<ShortUrl>> {
        self.get_json(&url_key(short_code))
    }

    async fn set_url(&self, url: &ShortUrl) -> CacheResult<()> {
        self.set_json(url_key(&url.short_code), url, self.ttls.url)
    }

    async fn invalidate_url(&self, short_code: &str) -> CacheResult<()> {
        self.remove(&url_key(short_code));
        Ok(())
    }

    async fn get_analytics(&self, url_id: Uuid) -> CacheResult<Option<UrlAnalytics>> {
        self.get_json(&analytics_key(url_id))
    }

    async fn set_analytics(&self, analytics: &UrlAnalytics) -> CacheResult<()> {
        self.set_json(
            analytics_key(analytics.url.id),
            analytics,
            self.ttls.analytics,
        )
    }

    async fn invalidate_analytics(&self, url_id: Uuid) -> CacheResult<()> {
        self.remove(&analytics_key(url_id));
        Ok(())
    }

    async fn get_owner_list(&self, key: &ListKey) -> CacheResult<Option<UrlPage>> {
        self.get_json(&key.render())
    }

    async fn set_owner_list(&self, key: &ListKey, page: &UrlPage) -> CacheResult<()> {
        self.set_json(key.render(), page, self.ttls.list)
    }

    async fn invalidate_owner_lists(&self, owner_id: &str) -> CacheResult<()> {
        if !self.is_available() {
            return Ok(());
        }

        let prefix = owner_lists_prefix(owner_id);
        self.lock().retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn increment_cached_clicks(&self, short_code: &str) -> CacheResult<()> {
        if !self.is_available() {
            return Ok(());
        }

        let now = Instant::now();
        let mut entries = self.lock();

        let counter = clicks_key(short_code);
        let next = entries
            .get(&counter)
            .and_then(|e| e.raw.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        entries.insert(
            counter,
            Entry {
                raw: next.to_string(),
                expires_at: None,
            },
        );

        if let Some(entry) = entries.get_mut(&url_key(short_code))
            && entry.is_live(now)
        {
            let mut snapshot: ShortUrl = serde_json::from_str(&entry.raw)?;
            snapshot.clicks += 1;
            entry.raw = serde_json::to_string(&snapshot)?;
        }

        Ok(())
    }

    async fn cached_click_count(&self, short_code: &str) -> CacheResult<u64> {
        Ok(self
            .get_raw(&clicks_key(short_code))
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0))
    }

    async fn reset_cached_clicks(&self, short_code: &str) -> CacheResult<()> {
        self.remove(&clicks_key(short_code));
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.is_available()
    }
}
