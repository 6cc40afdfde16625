//! Pagination and filtering query parameters.

use serde::Deserialize;
use serde_json::json;
use serde_with::{DisplayFromStr, serde_as};

use crate::domain::entities::ListQuery;
use crate::error::AppError;

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

/// Query parameters for `GET /api/urls`.
///
/// Uses `serde_with` to parse numbers and booleans from query strings.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<u32>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<u32>,

    /// Restricts the list to active (`true`) or inactive (`false`) URLs.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ListParams {
    /// Validates the parameters and converts them into a store query.
    ///
    /// # Defaults
    ///
    /// - `page`: 1
    /// - `limit`: 10
    ///
    /// # Validation
    ///
    /// - Page must be > 0
    /// - Limit must be between 1 and 100
    pub fn into_query(self) -> Result<ListQuery, AppError> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);

        if page == 0 {
            return Err(AppError::bad_request(
                "Page must be greater than 0",
                json!({ "page": page }),
            ));
        }

        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::bad_request(
                format!("Limit must be between 1 and {}", MAX_LIMIT),
                json!({ "limit": limit }),
            ));
        }

        Ok(ListQuery {
            page,
            limit,
            is_active: self.is_active,
        })
    }
}
