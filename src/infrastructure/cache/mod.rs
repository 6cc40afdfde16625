//! Cache-aside layer for redirects, owner lists and analytics views.
//!
//! Provides a [`CacheService`] trait with three implementations:
//! - [`RedisCache`] - Production Redis-backed cache
//! - [`MemoryCache`] - In-process cache with the same TTL semantics
//! - [`NullCache`] - No-op implementation for disabled caching

pub mod keys;
mod memory_cache;
mod null_cache;
mod redis_cache;
mod service;

pub use keys::ListKey;
pub use memory_cache::MemoryCache;
pub use null_cache::NullCache;
pub use redis_cache::RedisCache;
pub use service::{CacheError, CacheResult, CacheService, CacheTtls};

#[cfg(test)]
pub use service::MockCacheService;
