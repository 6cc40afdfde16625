//! Cache key layout.
//!
//! | Family | Key |
//! |---|---|
//! | single URL | `url:{shortCode}` |
//! | analytics | `analytics:{urlId}` |
//! | owner list page | `user_urls:{ownerId}:{page}:{limit}:{isActive or "all"}` |
//! | click counter | `clicks:{shortCode}` |

use uuid::Uuid;

use crate::domain::entities::ListQuery;

pub fn url_key(short_code: &str) -> String {
    format!("url:{short_code}")
}

pub fn analytics_key(url_id: Uuid) -> String {
    format!("analytics:{url_id}")
}

pub fn clicks_key(short_code: &str) -> String {
    format!("clicks:{short_code}")
}

/// Prefix shared by every list page cached for `owner_id`.
pub fn owner_lists_prefix(owner_id: &str) -> String {
    format!("user_urls:{owner_id}:")
}

/// SCAN `MATCH` pattern covering every list page of `owner_id`.
///
/// Glob metacharacters in the owner id are escaped so the pattern only
/// matches that owner's literal prefix.
pub fn owner_lists_pattern(owner_id: &str) -> String {
    let mut pattern = String::with_capacity(owner_id.len() + 12);
    pattern.push_str("user_urls:");
    for c in owner_id.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(":*");
    pattern
}

/// Identifies one cached page of an owner's URL list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub owner_id: String,
    pub query: ListQuery,
}

impl ListKey {
    pub fn new(owner_id: impl Into<String>, query: ListQuery) -> Self {
        Self {
            owner_id: owner_id.into(),
            query,
        }
    }

    pub fn render(&self) -> String {
        let filter = match self.query.is_active {
            Some(active) => active.to_string(),
            None => "all".to_string(),
        };
        format!(
            "{}{}:{}:{}",
            owner_lists_prefix(&self.owner_id),
            self.query.page,
            self.query.limit,
            filter
        )
    }
}
