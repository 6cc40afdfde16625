//! Handler for short URL redirect.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use std::net::SocketAddr;

use crate::domain::events::ClickContext;
use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its original URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Request Flow
///
/// 1. Check cache for the URL snapshot (`url:{code}`)
/// 2. On miss or cache error, query the database
/// 3. Reject inactive (404) and expired (410) URLs
/// 4. Increment the stored click count
/// 5. In the background: refresh the cache and publish a click event
/// 6. Return 302 Found
///
/// # Click Metadata
///
/// `User-Agent`, `Referer` and the peer address are attached to the
/// published click event.
///
/// # Errors
///
/// - 404 Not Found if the code is unknown or the URL is inactive
/// - 410 Gone if the URL has expired
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<impl IntoResponse, AppError> {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let context = ClickContext {
        user_agent: header_value(header::USER_AGENT),
        ip_address: Some(addr.ip().to_string()),
        referrer: header_value(header::REFERER),
    };

    let destination = state.url_service.redirect(&code, context).await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, destination)]))
}
