//! Repository trait for durable short URL storage.

use crate::domain::entities::{ListQuery, NewShortUrl, ShortUrl, ShortUrlPatch};
use crate::error::AppError;
use async_trait::async_trait;
use uuid::Uuid;

/// Durable CRUD over short URLs.
///
/// Implementations must enforce global uniqueness of `short_code` and perform
/// click increments atomically on the server side. Every ownership-scoped method
/// returns `None` both when the row is absent and when it belongs to someone else.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgUrlRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryUrlRepository`] - In-process implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRepository: Send + Sync {
    /// Inserts a new short URL, assigning its id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CodeConflict`] if `short_code` already exists.
    /// Returns [`AppError::Internal`] on database errors.
    async fn insert(&self, new_url: NewShortUrl) -> Result<ShortUrl, AppError>;

    /// Finds a URL by short code regardless of `is_active`.
    async fn find_by_short_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError>;

    /// Atomically performs `clicks = clicks + 1` and bumps `updated_at`.
    async fn increment_clicks(&self, code: &str) -> Result<(), AppError>;

    /// Lists an owner's URLs newest first, returning the page and the total
    /// number of rows matching the same predicate.
    async fn list_by_owner(
        &self,
        owner_id: &str,
        query: ListQuery,
    ) -> Result<(Vec<ShortUrl>, i64), AppError>;

    /// Finds a URL by id if it belongs to `owner_id`.
    async fn find_owned(&self, id: Uuid, owner_id: &str) -> Result<Option<ShortUrl>, AppError>;

    /// Applies `patch` to an owned URL and bumps `updated_at`.
    async fn update(
        &self,
        id: Uuid,
        owner_id: &str,
        patch: ShortUrlPatch,
    ) -> Result<Option<ShortUrl>, AppError>;

    /// Hard-deletes an owned URL, releasing its short code. Returns the removed row.
    async fn delete(&self, id: Uuid, owner_id: &str) -> Result<Option<ShortUrl>, AppError>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), AppError>;
}
