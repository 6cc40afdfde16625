//! Short URL entity and its creation/update inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A shortened URL owned by a principal.
///
/// The store owns this record. `clicks` only ever grows from the store's point of
/// view; cached copies may lag behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShortUrl {
    pub id: Uuid,
    pub original_url: String,
    pub short_code: String,
    pub owner_id: String,
    pub clicks: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShortUrl {
    /// Returns true if `expires_at` is set and lies in the past relative to `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e <= now)
    }

    /// Returns true if the link has passed its expiry time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Input data for inserting a new short URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShortUrl {
    pub original_url: String,
    pub short_code: String,
    pub owner_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update for an existing short URL.
///
/// `None` fields are left unchanged. `expires_at: Some(None)` clears the expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortUrlPatch {
    pub original_url: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl ShortUrlPatch {
    pub fn is_empty(&self) -> bool {
        self.original_url.is_none() && self.is_active.is_none() && self.expires_at.is_none()
    }

    /// Applies the patch in place. Does not touch `updated_at`.
    pub fn apply(&self, url: &mut ShortUrl) {
        if let Some(original_url) = &self.original_url {
            url.original_url = original_url.clone();
        }
        if let Some(is_active) = self.is_active {
            url.is_active = is_active;
        }
        if let Some(expires_at) = self.expires_at {
            url.expires_at = expires_at;
        }
    }
}

/// Owner-scoped list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListQuery {
    /// 1-indexed page number.
    pub page: u32,
    pub limit: u32,
    pub is_active: Option<bool>,
}

impl ListQuery {
    pub fn offset(&self) -> i64 {
        (i64::from(self.page.max(1)) - 1) * i64::from(self.limit)
    }
}

/// Pagination metadata for a list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit_i - 1) / limit_i,
        }
    }
}

/// One page of an owner's URLs together with its pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPage {
    pub rows: Vec<ShortUrl>,
    pub pagination: Pagination,
}

/// Analytics view of a short URL: the stored row plus its public short URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlAnalytics {
    #[serde(flatten)]
    pub url: ShortUrl,
    pub short_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> ShortUrl {
        let now = Utc::now();
        ShortUrl {
            id: Uuid::new_v4(),
            original_url: "https://example.com".to_string(),
            short_code: "abc123".to_string(),
            owner_id: "owner-1".to_string(),
            clicks: 0,
            is_active: true,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_not_expired_without_expiry() {
        assert!(!sample().is_expired());
    }

    #[test]
    fn test_expired_in_past() {
        let mut url = sample();
        url.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(url.is_expired());
    }

    #[test]
    fn test_future_expiry_is_not_expired() {
        let mut url = sample();
        url.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(!url.is_expired());
    }

    #[test]
    fn test_patch_apply_only_touches_present_fields() {
        let mut url = sample();
        let patch = ShortUrlPatch {
            is_active: Some(false),
            ..Default::default()
        };

        patch.apply(&mut url);

        assert!(!url.is_active);
        assert_eq!(url.original_url, "https://example.com");
        assert!(url.expires_at.is_none());
    }

    #[test]
    fn test_patch_can_clear_expiry() {
        let mut url = sample();
        url.expires_at = Some(Utc::now());

        ShortUrlPatch {
            expires_at: Some(None),
            ..Default::default()
        }
        .apply(&mut url);

        assert!(url.expires_at.is_none());
    }

    #[test]
    fn test_list_query_offset() {
        let q = ListQuery {
            page: 3,
            limit: 10,
            is_active: None,
        };
        assert_eq!(q.offset(), 20);
    }

    #[test]
    fn test_pagination_total_pages_rounds_up() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).total_pages, 2);
    }

    #[test]
    fn test_short_url_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["shortCode"], "abc123");
        assert_eq!(json["isActive"], true);
        assert!(json.get("short_code").is_none());
    }
}
