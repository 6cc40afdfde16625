//! Handlers for owner-scoped URL management.
//!
//! Every handler resolves the caller through [`OwnerId`]. A URL owned by
//! someone else is reported exactly like a missing one.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::dto::pagination::ListParams;
use crate::api::dto::urls::{
    AnalyticsResponse, CreateUrlRequest, UpdateUrlRequest, UrlListResponse, UrlResponse,
};
use crate::api::middleware::OwnerId;
use crate::domain::entities::ShortUrl;
use crate::error::AppError;
use crate::state::AppState;

fn to_response(state: &AppState, url: ShortUrl) -> UrlResponse {
    let short_url = state.url_service.short_url(&url.short_code);
    UrlResponse::new(url, short_url)
}

/// Creates a short URL.
///
/// # Endpoint
///
/// `POST /api/urls`
///
/// # Request Body
///
/// ```json
/// {
///   "originalUrl": "https://example.com/some/long/path",
///   "customCode": "promo24",              // optional
///   "expiresAt": "2026-12-31T23:59:59Z"    // optional
/// }
/// ```
///
/// # Response
///
/// `201 Created` with the new URL, including its public `shortUrl`.
///
/// # Errors
///
/// - 400 Bad Request if validation fails
/// - 409 Conflict if `customCode` is already taken
pub async fn create_url_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Json(payload): Json<CreateUrlRequest>,
) -> Result<(StatusCode, Json<UrlResponse>), AppError> {
    payload.validate()?;

    let url = state.url_service.create(&owner, payload.into()).await?;

    Ok((StatusCode::CREATED, Json(to_response(&state, url))))
}

/// Lists the caller's URLs, newest first.
///
/// # Endpoint
///
/// `GET /api/urls?page=1&limit=10&isActive=true`
///
/// # Errors
///
/// Returns 400 Bad Request for `page` < 1 or `limit` outside 1..=100.
pub async fn list_urls_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<ListParams>,
) -> Result<Json<UrlListResponse>, AppError> {
    let query = params.into_query()?;

    let page = state.url_service.list(&owner, query).await?;

    Ok(Json(UrlListResponse::new(page, |code| {
        state.url_service.short_url(code)
    })))
}

/// `GET /api/urls/{id}`
pub async fn get_url_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<UrlResponse>, AppError> {
    let url = state.url_service.get(id, &owner).await?;
    Ok(Json(to_response(&state, url)))
}

/// Partially updates a URL.
///
/// # Endpoint
///
/// `PUT /api/urls/{id}`
///
/// # Request Body
///
/// All fields are optional, but at least one must be present.
///
/// ```json
/// {
///   "originalUrl": "https://new-destination.com",
///   "isActive": false,
///   "expiresAt": null        // clears the expiry
/// }
/// ```
///
/// # Errors
///
/// - 400 Bad Request if validation fails or the body changes nothing
/// - 404 Not Found if the URL doesn't exist for this owner
pub async fn update_url_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUrlRequest>,
) -> Result<Json<UrlResponse>, AppError> {
    payload.validate()?;

    let url = state.url_service.update(id, &owner, payload.into()).await?;

    Ok(Json(to_response(&state, url)))
}

/// Deletes a URL and returns the removed record.
///
/// # Endpoint
///
/// `DELETE /api/urls/{id}`
///
/// # Errors
///
/// Returns 404 Not Found if the URL doesn't exist for this owner.
pub async fn delete_url_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<UrlResponse>, AppError> {
    let url = state.url_service.delete(id, &owner).await?;
    Ok(Json(to_response(&state, url)))
}

/// Returns the analytics snapshot for a URL.
///
/// # Endpoint
///
/// `GET /api/urls/{id}/analytics`
///
/// `clicks` comes from the store. `cachedClicks` is the cache's own counter
/// and is informational only.
pub async fn analytics_handler(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let analytics = state.url_service.analytics(id, &owner).await?;
    let cached_clicks = state
        .url_service
        .cached_click_count(&analytics.url.short_code)
        .await;

    Ok(Json(AnalyticsResponse::new(analytics, cached_clicks)))
}
