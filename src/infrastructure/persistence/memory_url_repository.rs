//! In-process implementation of the URL repository.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::entities::{ListQuery, NewShortUrl, ShortUrl, ShortUrlPatch};
use crate::domain::repositories::UrlRepository;
use crate::error::{AppError, SHORT_CODE_CONSTRAINT};

#[derive(Default)]
struct Tables {
    rows: HashMap<Uuid, (u64, ShortUrl)>,
    by_code: HashMap<String, Uuid>,
    next_seq: u64,
}

/// Repository kept in process memory.
///
/// Every method runs under a single mutex, which gives the same guarantees the
/// PostgreSQL repository gets from its unique constraint and server-side
/// increment. [`MemoryUrlRepository::set_failing`] makes every call fail with
/// [`AppError::Internal`] to simulate an unreachable database.
#[derive(Default)]
pub struct MemoryUrlRepository {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl MemoryUrlRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::internal(
                "Database error",
                json!({ "reason": "store unavailable" }),
            ));
        }
        Ok(self
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn owned<'a>(tables: &'a mut Tables, id: Uuid, owner_id: &str) -> Option<&'a mut ShortUrl> {
        tables
            .rows
            .get_mut(&id)
            .map(|(_, url)| url)
            .filter(|url| url.owner_id == owner_id)
    }
}

#[async_trait]
impl UrlRepository for MemoryUrlRepository {
    async fn insert(&self, new_url: NewShortUrl) -> Result<ShortUrl, AppError> {
        let mut tables = self.lock()?;

        if tables.by_code.contains_key(&new_url.short_code) {
            return Err(AppError::conflict(
                "Short code already exists",
                json!({ "constraint": SHORT_CODE_CONSTRAINT }),
            ));
        }

        let now = Utc::now();
        let url = ShortUrl {
            id: Uuid::new_v4(),
            original_url: new_url.original_url,
            short_code: new_url.short_code,
            owner_id: new_url.owner_id,
            clicks: 0,
            is_active: true,
            expires_at: new_url.expires_at,
            created_at: now,
            updated_at: now,
        };

        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables.by_code.insert(url.short_code.clone(), url.id);
        tables.rows.insert(url.id, (seq, url.clone()));

        Ok(url)
    }

    async fn find_by_short_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError> {
        let tables = self.lock()?;

        Ok(tables
            .by_code
            .get(code)
            .and_then(|id| tables.rows.get(id))
            .map(|(_, url)| url.clone()))
    }

    async fn increment_clicks(&self, code: &str) -> Result<(), AppError> {
        let mut tables = self.lock()?;

        if let Some(id) = tables.by_code.get(code).copied()
            && let Some((_, url)) = tables.rows.get_mut(&id)
        {
            url.clicks += 1;
            url.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        query: ListQuery,
    ) -> Result<(Vec<ShortUrl>, i64), AppError> {
        let tables = self.lock()?;

        let mut matching: Vec<&(u64, ShortUrl)> = tables
            .rows
            .values()
            .filter(|(_, url)| url.owner_id == owner_id)
            .filter(|(_, url)| query.is_active.is_none_or(|active| url.is_active == active))
            .collect();

        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });

        let total = matching.len() as i64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let rows = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .map(|(_, url)| url.clone())
            .collect();

        Ok((rows, total))
    }

    async fn find_owned(&self, id: Uuid, owner_id: &str) -> Result<Option<ShortUrl>, AppError> {
        let mut tables = self.lock()?;
        Ok(Self::owned(&mut tables, id, owner_id).map(|url| url.clone()))
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: &str,
        patch: ShortUrlPatch,
    ) -> Result<Option<ShortUrl>, AppError> {
        let mut tables = self.lock()?;

        Ok(Self::owned(&mut tables, id, owner_id).map(|url| {
            patch.apply(url);
            url.updated_at = Utc::now();
            url.clone()
        }))
    }

    async fn delete(&self, id: Uuid, owner_id: &str) -> Result<Option<ShortUrl>, AppError> {
        let mut tables = self.lock()?;

        if Self::owned(&mut tables, id, owner_id).is_none() {
            return Ok(None);
        }

        let removed = tables.rows.remove(&id).map(|(_, url)| url);
        if let Some(url) = &removed {
            tables.by_code.remove(&url.short_code);
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }
}
