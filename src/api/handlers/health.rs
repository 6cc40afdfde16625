//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};
use std::collections::BTreeMap;

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::domain::events::EventChannelName;
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// Only the database is required to serve requests. A degraded cache or
/// event channel shows up here but requests keep working.
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "Connected" },
///     "cache": { "status": "ok", "message": "Cache reachable" },
///     "events": { "status": "ok", "message": "connected" }
///   },
///   "queues": { "url_analytics": 0, "url_clicks": 2, "user_activities": 0 }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let db_check = check_database(&state).await;

    let cache_check = check_cache(&state).await;

    let events_check = check_events(&state);

    let mut queues = BTreeMap::new();
    for channel in EventChannelName::ALL {
        let depth = state.url_service.events().queue_depth(channel).await;
        queues.insert(channel.as_str(), depth);
    }

    let all_healthy = db_check.is_ok() && cache_check.is_ok() && events_check.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database: db_check,
            cache: cache_check,
            events: events_check,
        },
        queues,
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_database(state: &AppState) -> CheckStatus {
    match state.url_service.repository().ping().await {
        Ok(()) => CheckStatus::ok("Connected"),
        Err(e) => CheckStatus::error(format!("Database error: {}", e)),
    }
}

async fn check_cache(state: &AppState) -> CheckStatus {
    if state.url_service.cache().health_check().await {
        CheckStatus::ok("Cache reachable")
    } else {
        CheckStatus::error("Cache unreachable")
    }
}

/// A disabled channel is healthy: nothing was configured to be reached.
fn check_events(state: &AppState) -> CheckStatus {
    let events = state.url_service.events();

    if !events.is_enabled() {
        CheckStatus::ok("Event channel disabled")
    } else if events.is_healthy() {
        CheckStatus::ok(events.state().to_string())
    } else if events.has_given_up() {
        CheckStatus::error("Gave up reconnecting")
    } else {
        CheckStatus::error(events.state().to_string())
    }
}
