//! DTOs for the URL management endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::application::services::CreateUrl;
use crate::domain::entities::{Pagination, ShortUrl, ShortUrlPatch, UrlAnalytics, UrlPage};

/// Request body for `POST /api/urls`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlRequest {
    /// Destination; must be an absolute http(s) URL.
    #[validate(url(message = "Invalid URL format"))]
    pub original_url: String,

    /// Optional caller-chosen code, 3-10 alphanumeric characters.
    #[validate(length(min = 3, max = 10, message = "Custom code must be 3-10 characters"))]
    pub custom_code: Option<String>,

    /// RFC 3339 timestamp after which redirects return 410 Gone.
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<CreateUrlRequest> for CreateUrl {
    fn from(req: CreateUrlRequest) -> Self {
        Self {
            original_url: req.original_url,
            custom_code: req.custom_code,
            expires_at: req.expires_at,
        }
    }
}

/// Request body for `PUT /api/urls/{id}`.
///
/// Only provided fields are changed.
///
/// # `expiresAt` semantics
///
/// - **Absent** → leave existing value unchanged
/// - **`null`** → clear expiry (URL never expires)
/// - **Timestamp** → set new expiry
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUrlRequest {
    #[validate(url(message = "Invalid URL format"))]
    pub original_url: Option<String>,

    pub is_active: Option<bool>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl From<UpdateUrlRequest> for ShortUrlPatch {
    fn from(req: UpdateUrlRequest) -> Self {
        Self {
            original_url: req.original_url,
            is_active: req.is_active,
            expires_at: req.expires_at,
        }
    }
}

/// JSON representation of a short URL.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlResponse {
    pub id: Uuid,
    pub original_url: String,
    pub short_code: String,
    pub short_url: String,
    pub clicks: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UrlResponse {
    pub fn new(url: ShortUrl, short_url: String) -> Self {
        Self {
            id: url.id,
            original_url: url.original_url,
            short_code: url.short_code,
            short_url,
            clicks: url.clicks,
            is_active: url.is_active,
            expires_at: url.expires_at,
            created_at: url.created_at,
            updated_at: url.updated_at,
        }
    }
}

/// Response for `GET /api/urls`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UrlListResponse {
    pub rows: Vec<UrlResponse>,
    pub pagination: Pagination,
}

impl UrlListResponse {
    /// Builds the response, deriving each row's short URL with `short_url`.
    pub fn new(page: UrlPage, short_url: impl Fn(&str) -> String) -> Self {
        let rows = page
            .rows
            .into_iter()
            .map(|url| {
                let link = short_url(&url.short_code);
                UrlResponse::new(url, link)
            })
            .collect();

        Self {
            rows,
            pagination: page.pagination,
        }
    }
}

/// Response for `GET /api/urls/{id}/analytics`.
///
/// `clicks` is the stored count. `cachedClicks` is the cache's independent
/// counter and may lag or lead it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    #[serde(flatten)]
    pub url: UrlResponse,
    pub cached_clicks: u64,
}

impl AnalyticsResponse {
    pub fn new(analytics: UrlAnalytics, cached_clicks: u64) -> Self {
        Self {
            url: UrlResponse::new(analytics.url, analytics.short_url),
            cached_clicks,
        }
    }
}
