//! PostgreSQL implementation of the URL repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entities::{ListQuery, NewShortUrl, ShortUrl, ShortUrlPatch};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

const COLUMNS: &str =
    "id, original_url, short_code, owner_id, clicks, is_active, expires_at, created_at, updated_at";

/// PostgreSQL repository for short URL storage.
///
/// Short code uniqueness is enforced by the `urls_short_code_key` constraint and
/// click counting by a server-side `clicks = clicks + 1`, so neither needs an
/// application lock.
pub struct PgUrlRepository {
    pool: Arc<PgPool>,
}

impl PgUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UrlRepository for PgUrlRepository {
    async fn insert(&self, new_url: NewShortUrl) -> Result<ShortUrl, AppError> {
        let sql = format!(
            r#"
            INSERT INTO urls (original_url, short_code, owner_id, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        );

        let url = sqlx::query_as::<_, ShortUrl>(&sql)
            .bind(new_url.original_url)
            .bind(new_url.short_code)
            .bind(new_url.owner_id)
            .bind(new_url.expires_at)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(url)
    }

    async fn find_by_short_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError> {
        let sql = format!("SELECT {COLUMNS} FROM urls WHERE short_code = $1");

        let url = sqlx::query_as::<_, ShortUrl>(&sql)
            .bind(code)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(url)
    }

    async fn increment_clicks(&self, code: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE urls SET clicks = clicks + 1, updated_at = NOW() WHERE short_code = $1",
        )
        .bind(code)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        query: ListQuery,
    ) -> Result<(Vec<ShortUrl>, i64), AppError> {
        let rows_sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM urls
            WHERE owner_id = $1 AND ($2::boolean IS NULL OR is_active = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        );

        let rows = sqlx::query_as::<_, ShortUrl>(&rows_sql)
            .bind(owner_id)
            .bind(query.is_active)
            .bind(i64::from(query.limit))
            .bind(query.offset())
            .fetch_all(self.pool.as_ref());

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM urls WHERE owner_id = $1 AND ($2::boolean IS NULL OR is_active = $2)",
        )
        .bind(owner_id)
        .bind(query.is_active)
        .fetch_one(self.pool.as_ref());

        let (rows, total) = tokio::try_join!(rows, total)?;

        Ok((rows, total))
    }

    async fn find_owned(&self, id: Uuid, owner_id: &str) -> Result<Option<ShortUrl>, AppError> {
        let sql = format!("SELECT {COLUMNS} FROM urls WHERE id = $1 AND owner_id = $2");

        let url = sqlx::query_as::<_, ShortUrl>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(url)
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: &str,
        patch: ShortUrlPatch,
    ) -> Result<Option<ShortUrl>, AppError> {
        let sql = format!(
            r#"
            UPDATE urls SET
                original_url = COALESCE($3, original_url),
                is_active    = COALESCE($4, is_active),
                expires_at   = CASE WHEN $5 THEN $6 ELSE expires_at END,
                updated_at   = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {COLUMNS}
            "#
        );

        let url = sqlx::query_as::<_, ShortUrl>(&sql)
            .bind(id)
            .bind(owner_id)
            .bind(patch.original_url)
            .bind(patch.is_active)
            .bind(patch.expires_at.is_some())
            .bind(patch.expires_at.flatten())
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(url)
    }

    async fn delete(&self, id: Uuid, owner_id: &str) -> Result<Option<ShortUrl>, AppError> {
        let sql = format!("DELETE FROM urls WHERE id = $1 AND owner_id = $2 RETURNING {COLUMNS}");

        let url = sqlx::query_as::<_, ShortUrl>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(url)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
