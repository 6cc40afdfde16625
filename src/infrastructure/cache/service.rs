//! Cache service trait and error types.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::entities::{ShortUrl, UrlAnalytics, UrlPage};
use crate::infrastructure::cache::keys::ListKey;

/// Errors that can occur during cache operations.
///
/// These never reach API callers: the orchestrator treats a failed read as a
/// miss and a failed write as a dropped write.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    #[error("Cache operation error: {0}")]
    OperationError(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Per-family time-to-live settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// `url:{shortCode}` entries.
    pub url: Duration,
    /// `analytics:{urlId}` entries.
    pub analytics: Duration,
    /// `user_urls:{ownerId}:...` entries.
    pub list: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            url: Duration::from_secs(3600),
            analytics: Duration::from_secs(300),
            list: Duration::from_secs(300),
        }
    }
}

/// Cache-aside storage for URL snapshots, analytics snapshots and owner list pages,
/// plus an independent per-code click counter.
///
/// Implementations must be thread-safe and fail open: when the backend is
/// unreachable, reads report a miss and writes are dropped. Entries are snapshots
/// and may lag the store by up to their TTL.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache with TTL support
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process cache with TTL support
/// - [`crate::infrastructure::cache::NullCache`] - No-op implementation for disabled caching
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Returns the cached snapshot for `short_code`, or `None` on miss.
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<ShortUrl>>;

    /// Stores a snapshot under `url:{shortCode}`.
    async fn set_url(&self, url: &ShortUrl) -> CacheResult<()>;

    /// Removes the `url:{shortCode}` entry.
    async fn invalidate_url(&self, short_code: &str) -> CacheResult<()>;

    async fn get_analytics(&self, url_id: Uuid) -> CacheResult<Option<UrlAnalytics>>;

    async fn set_analytics(&self, analytics: &UrlAnalytics) -> CacheResult<()>;

    async fn invalidate_analytics(&self, url_id: Uuid) -> CacheResult<()>;

    async fn get_owner_list(&self, key: &ListKey) -> CacheResult<Option<UrlPage>>;

    async fn set_owner_list(&self, key: &ListKey, page: &UrlPage) -> CacheResult<()>;

    /// Drops every cached list page for `owner_id`, whatever its page, limit or filter.
    async fn invalidate_owner_lists(&self, owner_id: &str) -> CacheResult<()>;

    /// Bumps the `clicks:{shortCode}` counter and, when a snapshot is cached,
    /// its `clicks` field. Never consults the store.
    async fn increment_cached_clicks(&self, short_code: &str) -> CacheResult<()>;

    /// Reads the `clicks:{shortCode}` counter, `0` when absent.
    async fn cached_click_count(&self, short_code: &str) -> CacheResult<u64>;

    /// Removes the `clicks:{shortCode}` counter so a reused code starts at zero.
    async fn reset_cached_clicks(&self, short_code: &str) -> CacheResult<()>;

    /// Checks if the cache backend is reachable.
    async fn health_check(&self) -> bool;
}
