//! Event payloads carried by the event channel.
//!
//! Events are denormalized so consumers can act on them without a store lookup.
//! They are JSON-encoded on the wire using camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::domain::entities::ShortUrl;

/// Named channels on the event transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventChannelName {
    UrlClicks,
    UrlAnalytics,
    UserActivities,
}

impl EventChannelName {
    pub const ALL: [EventChannelName; 3] = [
        EventChannelName::UrlClicks,
        EventChannelName::UrlAnalytics,
        EventChannelName::UserActivities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventChannelName::UrlClicks => "url_clicks",
            EventChannelName::UrlAnalytics => "url_analytics",
            EventChannelName::UserActivities => "user_activities",
        }
    }
}

impl fmt::Display for EventChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client metadata captured at redirect time. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickContext {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub referrer: Option<String>,
}

/// Published on `url_clicks` for every successful redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub short_code: String,
    pub url_id: Uuid,
    pub owner_id: String,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(url: &ShortUrl, context: ClickContext) -> Self {
        Self {
            short_code: url.short_code.clone(),
            url_id: url.id,
            owner_id: url.owner_id.clone(),
            original_url: url.original_url.clone(),
            user_agent: context.user_agent,
            ip_address: context.ip_address,
            referrer: context.referrer,
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle action recorded on `url_analytics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsAction {
    Created,
    Updated,
    Deleted,
    Viewed,
}

impl AnalyticsAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsAction::Created => "created",
            AnalyticsAction::Updated => "updated",
            AnalyticsAction::Deleted => "deleted",
            AnalyticsAction::Viewed => "viewed",
        }
    }
}

/// Published on `url_analytics` whenever a URL is created, updated, deleted or
/// its analytics are viewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlAnalyticsEvent {
    pub url_id: Uuid,
    pub owner_id: String,
    pub action: AnalyticsAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl UrlAnalyticsEvent {
    pub fn new(url: &ShortUrl, action: AnalyticsAction, metadata: Option<Value>) -> Self {
        Self {
            url_id: url.id,
            owner_id: url.owner_id.clone(),
            action,
            metadata,
            timestamp: Utc::now(),
        }
    }
}

/// Published on `user_activities` for owner-initiated mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityEvent {
    pub owner_id: String,
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl UserActivityEvent {
    /// Activity on a short URL (`resource = "url"`).
    pub fn for_url(url: &ShortUrl, action: AnalyticsAction) -> Self {
        Self {
            owner_id: url.owner_id.clone(),
            action: action.as_str().to_string(),
            resource: "url".to_string(),
            resource_id: Some(url.id.to_string()),
            metadata: None,
            timestamp: Utc::now(),
        }
    }
}
