//! Short URL lifecycle: create, read, update, delete and redirect.
//!
//! Every operation follows the same shape. The store call is awaited and its
//! failure aborts the operation. Cache maintenance and event publishing run
//! afterwards through [`SideEffects`] and cannot change the result. The one
//! exception is the `url:{code}` eviction on update and delete, which is
//! awaited (still fail-soft) so the next redirect reads the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::side_effects::{EffectError, SideEffects};
use crate::domain::entities::{
    ListQuery, NewShortUrl, Pagination, ShortUrl, ShortUrlPatch, UrlAnalytics, UrlPage,
};
use crate::domain::events::{
    AnalyticsAction, ClickContext, ClickEvent, EventChannelName, UrlAnalyticsEvent,
    UserActivityEvent,
};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::{CacheService, ListKey};
use crate::infrastructure::events::EventChannel;
use crate::utils::code_generator::{
    DEFAULT_CODE_LENGTH, generate_code, is_reserved, validate_custom_code,
};
use crate::utils::url_validator::validate_destination;

/// Generated-code collisions tolerated before giving up.
const MAX_CODE_ATTEMPTS: usize = 10;

/// Input for [`UrlService::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateUrl {
    pub original_url: String,
    pub custom_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Orchestrates the store, the cache and the event channel.
pub struct UrlService {
    repository: Arc<dyn UrlRepository>,
    cache: Arc<dyn CacheService>,
    events: EventChannel,
    effects: SideEffects,
    base_url: String,
    code_length: usize,
}

fn url_not_found() -> AppError {
    AppError::not_found("Short URL not found", json!({}))
}

fn validate_url(original_url: &str) -> Result<(), AppError> {
    validate_destination(original_url).map_err(|e| {
        AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
    })
}

fn validate_expiry(expires_at: Option<DateTime<Utc>>) -> Result<(), AppError> {
    match expires_at {
        Some(expires_at) if expires_at <= Utc::now() => Err(AppError::bad_request(
            "expiresAt must be in the future",
            json!({ "expiresAt": expires_at }),
        )),
        _ => Ok(()),
    }
}

/// Fields touched by an update, as sent with the `updated` event.
fn patch_metadata(patch: &ShortUrlPatch) -> Value {
    let mut changes = Map::new();
    if let Some(original_url) = &patch.original_url {
        changes.insert("originalUrl".to_string(), json!(original_url));
    }
    if let Some(is_active) = patch.is_active {
        changes.insert("isActive".to_string(), json!(is_active));
    }
    if let Some(expires_at) = patch.expires_at {
        changes.insert("expiresAt".to_string(), json!(expires_at));
    }
    Value::Object(changes)
}

impl UrlService {
    pub fn new(
        repository: Arc<dyn UrlRepository>,
        cache: Arc<dyn CacheService>,
        events: EventChannel,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            cache,
            events,
            effects: SideEffects::new(),
            base_url: base_url.into(),
            code_length: DEFAULT_CODE_LENGTH,
        }
    }

    /// Overrides the length of generated codes.
    pub fn with_code_length(mut self, code_length: usize) -> Self {
        self.code_length = code_length;
        self
    }

    pub fn side_effects(&self) -> &SideEffects {
        &self.effects
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn cache(&self) -> &Arc<dyn CacheService> {
        &self.cache
    }

    pub fn repository(&self) -> &Arc<dyn UrlRepository> {
        &self.repository
    }

    /// Public URL for `short_code`.
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), short_code)
    }

    /// Creates a short URL for `owner_id`.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a malformed URL, custom code or expiry
    /// - [`AppError::CodeConflict`] if the custom code is taken
    /// - [`AppError::Internal`] on store failure or repeated code collisions
    pub async fn create(&self, owner_id: &str, input: CreateUrl) -> Result<ShortUrl, AppError> {
        validate_url(&input.original_url)?;
        validate_expiry(input.expires_at)?;

        let url = match input.custom_code {
            Some(code) => {
                self.insert_custom(NewShortUrl {
                    original_url: input.original_url,
                    short_code: code,
                    owner_id: owner_id.to_string(),
                    expires_at: input.expires_at,
                })
                .await?
            }
            None => {
                self.insert_generated(owner_id, input.original_url, input.expires_at)
                    .await?
            }
        };

        info!(short_code = %url.short_code, owner_id, "Short URL created");

        let cache = Arc::clone(&self.cache);
        let snapshot = url.clone();
        self.effects.dispatch("cache new url", async move {
            cache.set_url(&snapshot).await?;
            cache.invalidate_owner_lists(&snapshot.owner_id).await?;
            Ok(())
        });

        let metadata = json!({
            "shortCode": url.short_code,
            "originalUrl": url.original_url,
        });
        self.publish_lifecycle(&url, AnalyticsAction::Created, Some(metadata));

        Ok(url)
    }

    async fn insert_custom(&self, new_url: NewShortUrl) -> Result<ShortUrl, AppError> {
        validate_custom_code(&new_url.short_code)?;

        let taken = || {
            AppError::conflict(
                "Custom short code already exists",
                json!({ "shortCode": new_url.short_code }),
            )
        };

        if self
            .repository
            .find_by_short_code(&new_url.short_code)
            .await?
            .is_some()
        {
            return Err(taken());
        }

        match self.repository.insert(new_url.clone()).await {
            Err(AppError::CodeConflict { .. }) => Err(taken()),
            result => result,
        }
    }

    async fn insert_generated(
        &self,
        owner_id: &str,
        original_url: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ShortUrl, AppError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let short_code = generate_code(self.code_length);
            if is_reserved(&short_code) {
                continue;
            }

            let new_url = NewShortUrl {
                original_url: original_url.clone(),
                short_code,
                owner_id: owner_id.to_string(),
                expires_at,
            };

            match self.repository.insert(new_url).await {
                Err(AppError::CodeConflict { .. }) => {
                    debug!("Short code collision on attempt {}", attempt);
                }
                result => return result,
            }
        }

        Err(AppError::internal(
            "Failed to generate unique code",
            json!({ "reason": "Too many collisions" }),
        ))
    }

    /// Resolves `short_code` to its destination and records the click.
    ///
    /// Inactive URLs are reported as not found, never as forbidden.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the code is unknown or deactivated
    /// - [`AppError::Expired`] if the URL is past its expiry
    /// - [`AppError::Internal`] if the store cannot be read or the click cannot
    ///   be counted
    pub async fn redirect(&self, short_code: &str, context: ClickContext) -> Result<String, AppError> {
        let (url, cached) = match self.cache.get_url(short_code).await.ok().flatten() {
            Some(url) => (url, true),
            None => {
                let url = self
                    .repository
                    .find_by_short_code(short_code)
                    .await?
                    .ok_or_else(url_not_found)?;
                (url, false)
            }
        };

        if !url.is_active {
            return Err(url_not_found());
        }
        if url.is_expired() {
            return Err(AppError::expired(
                "Short URL has expired",
                json!({ "expiredAt": url.expires_at }),
            ));
        }

        self.repository.increment_clicks(&url.short_code).await?;

        let cache = Arc::clone(&self.cache);
        let short_code = url.short_code.clone();
        let snapshot = (!cached).then(|| url.clone());
        self.effects.dispatch("record cached click", async move {
            if let Some(snapshot) = snapshot {
                cache.set_url(&snapshot).await?;
            }
            cache.increment_cached_clicks(&short_code).await?;
            Ok(())
        });

        self.publish(
            EventChannelName::UrlClicks,
            "publish click",
            ClickEvent::new(&url, context),
        );

        Ok(url.original_url)
    }

    /// Lists one page of `owner_id`'s URLs, newest first.
    pub async fn list(&self, owner_id: &str, query: ListQuery) -> Result<UrlPage, AppError> {
        let key = ListKey::new(owner_id, query);

        if let Some(page) = self.cache.get_owner_list(&key).await.ok().flatten() {
            return Ok(page);
        }

        let (rows, total) = self.repository.list_by_owner(owner_id, query).await?;
        let page = UrlPage {
            rows,
            pagination: Pagination::new(query.page, query.limit, total),
        };

        let cache = Arc::clone(&self.cache);
        let snapshot = page.clone();
        self.effects.dispatch("cache owner list", async move {
            cache.set_owner_list(&key, &snapshot).await?;
            Ok(())
        });

        Ok(page)
    }

    /// Fetches one URL owned by `owner_id`.
    pub async fn get(&self, id: Uuid, owner_id: &str) -> Result<ShortUrl, AppError> {
        self.repository
            .find_owned(id, owner_id)
            .await?
            .ok_or_else(url_not_found)
    }

    /// Applies `patch` to a URL owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for an empty patch or invalid values
    /// - [`AppError::NotFound`] if the URL is absent or not owned by the caller
    pub async fn update(
        &self,
        id: Uuid,
        owner_id: &str,
        patch: ShortUrlPatch,
    ) -> Result<ShortUrl, AppError> {
        if patch.is_empty() {
            return Err(AppError::bad_request("No fields to update", json!({})));
        }
        if let Some(original_url) = &patch.original_url {
            validate_url(original_url)?;
        }
        validate_expiry(patch.expires_at.flatten())?;

        let metadata = patch_metadata(&patch);
        let url = self
            .repository
            .update(id, owner_id, patch)
            .await?
            .ok_or_else(url_not_found)?;

        info!(short_code = %url.short_code, owner_id, "Short URL updated");

        // Redirects must not see the old snapshot once this returns.
        self.evict_url(&url.short_code).await;

        let cache = Arc::clone(&self.cache);
        let snapshot = url.clone();
        self.effects.dispatch("refresh updated url", async move {
            cache.set_url(&snapshot).await?;
            cache.invalidate_analytics(snapshot.id).await?;
            cache.invalidate_owner_lists(&snapshot.owner_id).await?;
            Ok(())
        });

        self.publish_lifecycle(&url, AnalyticsAction::Updated, Some(metadata));

        Ok(url)
    }

    /// Deletes a URL owned by `owner_id` and returns the removed record.
    pub async fn delete(&self, id: Uuid, owner_id: &str) -> Result<ShortUrl, AppError> {
        let url = self
            .repository
            .delete(id, owner_id)
            .await?
            .ok_or_else(url_not_found)?;

        info!(short_code = %url.short_code, owner_id, "Short URL deleted");

        self.evict_url(&url.short_code).await;

        let cache = Arc::clone(&self.cache);
        let snapshot = url.clone();
        self.effects.dispatch("evict deleted url", async move {
            cache.reset_cached_clicks(&snapshot.short_code).await?;
            cache.invalidate_analytics(snapshot.id).await?;
            cache.invalidate_owner_lists(&snapshot.owner_id).await?;
            Ok(())
        });

        self.publish_lifecycle(&url, AnalyticsAction::Deleted, None);

        Ok(url)
    }

    /// Analytics snapshot of a URL owned by `owner_id`.
    ///
    /// A cached snapshot is served only to its owner; anyone else falls
    /// through to the owner-scoped store lookup and gets [`AppError::NotFound`].
    pub async fn analytics(&self, id: Uuid, owner_id: &str) -> Result<UrlAnalytics, AppError> {
        if let Some(cached) = self.cache.get_analytics(id).await.ok().flatten()
            && cached.url.owner_id == owner_id
        {
            return Ok(cached);
        }

        let url = self.get(id, owner_id).await?;
        let analytics = UrlAnalytics {
            short_url: self.short_url(&url.short_code),
            url,
        };

        let cache = Arc::clone(&self.cache);
        let snapshot = analytics.clone();
        self.effects.dispatch("cache analytics", async move {
            cache.set_analytics(&snapshot).await?;
            Ok(())
        });

        self.publish(
            EventChannelName::UrlAnalytics,
            "publish analytics view",
            UrlAnalyticsEvent::new(&analytics.url, AnalyticsAction::Viewed, None),
        );

        Ok(analytics)
    }

    /// Finishes outstanding side effects, then closes the event channel.
    ///
    /// Effects go first so publishes queued by the last requests still reach
    /// the broker. Returns false if the drain hit `timeout`.
    pub async fn shutdown(&self, timeout: std::time::Duration) -> bool {
        let drained = self.effects.drain(timeout).await;
        if !drained {
            warn!("Some side effects did not finish before shutdown");
        }
        self.events.shutdown().await;
        drained
    }

    /// Click count kept by the cache's independent counter. Informational;
    /// the store's `clicks` is authoritative.
    pub async fn cached_click_count(&self, short_code: &str) -> u64 {
        self.cache
            .cached_click_count(short_code)
            .await
            .unwrap_or_default()
    }

    /// Drops the cached `url:{code}` snapshot before returning to the caller.
    /// A cache failure is logged and ignored.
    async fn evict_url(&self, short_code: &str) {
        if let Err(e) = self.cache.invalidate_url(short_code).await {
            warn!(effect = "evict cached url", error = %e, "Best-effort side effect failed");
        }
    }

    fn publish_lifecycle(&self, url: &ShortUrl, action: AnalyticsAction, metadata: Option<Value>) {
        self.publish(
            EventChannelName::UrlAnalytics,
            "publish lifecycle event",
            UrlAnalyticsEvent::new(url, action, metadata),
        );
        self.publish(
            EventChannelName::UserActivities,
            "publish user activity",
            UserActivityEvent::for_url(url, action),
        );
    }

    fn publish<E>(&self, channel: EventChannelName, label: &'static str, event: E)
    where
        E: Serialize + Send + Sync + 'static,
    {
        let events = self.events.clone();
        self.effects.dispatch(label, async move {
            if events.publish(channel, &event).await {
                Ok(())
            } else {
                Err(EffectError::NotPublished(channel))
            }
        });
    }
}
