//! Caller identity extraction.
//!
//! Authentication happens upstream. The authenticating proxy forwards the
//! principal in `X-Owner-Id`; this extractor only checks that it is present.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde_json::json;

use crate::error::AppError;

/// Header carrying the authenticated principal.
pub const OWNER_HEADER: &str = "x-owner-id";

const MAX_OWNER_LEN: usize = 255;

/// Identifier of the principal making the request.
///
/// # Errors
///
/// Rejects with `401 Unauthorized` if the header is missing, empty, not
/// valid UTF-8, or longer than 255 bytes.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OwnerId(owner): OwnerId) -> String {
///     format!("hello {owner}")
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && v.len() <= MAX_OWNER_LEN)
            .map(|v| OwnerId(v.to_string()))
            .ok_or_else(|| {
                AppError::unauthorized(
                    "Unauthorized",
                    json!({ "reason": "X-Owner-Id header is missing or invalid" }),
                )
            })
    }
}
