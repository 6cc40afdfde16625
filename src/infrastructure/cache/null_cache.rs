//! No-op cache implementation for disabled caching.

use super::keys::ListKey;
use super::service::{CacheResult, CacheService};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::{ShortUrl, UrlAnalytics, UrlPage};

/// A cache implementation that does nothing.
///
/// Used when Redis is not configured or could not be reached at startup.
/// Every read misses and every write succeeds without storing anything, so all
/// traffic falls through to the store.
pub struct NullCache;

impl NullCache {
    /// Creates a new NullCache instance.
    pub fn new() -> Self {
        debug!("Using NullCache (caching disabled)");
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheService for NullCache {
    async fn get_url(&self, _short_code: &str) -> CacheResult<Option<ShortUrl>> {
        Ok(None)
    }

    async fn set_url(&self, _url: &ShortUrl) -> CacheResult<()> {
        Ok(())
    }

    async fn invalidate_url(&self, _short_code: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn get_analytics(&self, _url_id: Uuid) -> CacheResult<Option<UrlAnalytics>> {
        Ok(None)
    }

    async fn set_analytics(&self, _analytics: &UrlAnalytics) -> CacheResult<()> {
        Ok(())
    }

    async fn invalidate_analytics(&self, _url_id: Uuid) -> CacheResult<()> {
        Ok(())
    }

    async fn get_owner_list(&self, _key: &ListKey) -> CacheResult<Option<UrlPage>> {
        Ok(None)
    }

    async fn set_owner_list(&self, _key: &ListKey, _page: &UrlPage) -> CacheResult<()> {
        Ok(())
    }

    async fn invalidate_owner_lists(&self, _owner_id: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn increment_cached_clicks(&self, _short_code: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn cached_click_count(&self, _short_code: &str) -> CacheResult<u64> {
        Ok(0)
    }

    async fn reset_cached_clicks(&self, _short_code: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
