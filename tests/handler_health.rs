mod common;

use axum::http::StatusCode;
use common::{spawn_app, spawn_app_with};
use linkpulse::infrastructure::events::{EventChannel, MemoryBroker};
use serde_json::Value;

#[tokio::test]
async fn test_health_endpoint_success() {
    let app = spawn_app().await;

    let response = app.server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["cache"]["status"], "ok");
    assert_eq!(json["checks"]["events"]["status"], "ok");
    assert_eq!(json["checks"]["events"]["message"], "connected");
}

#[tokio::test]
async fn test_health_reports_queue_depths() {
    let app = spawn_app().await;
    app.create_url("https://example.com").await;
    app.settle().await;

    let json = app.server.get("/health").await.json::<Value>();

    assert_eq!(json["queues"]["url_clicks"], 0);
    assert_eq!(json["queues"]["url_analytics"], 1);
    assert_eq!(json["queues"]["user_activities"], 1);
}

#[tokio::test]
async fn test_health_degraded_on_cache_outage() {
    let app = spawn_app().await;
    app.cache.set_available(false);

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let json = response.json::<Value>();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["cache"]["status"], "error");
    assert_eq!(json["checks"]["database"]["status"], "ok");
}

#[tokio::test]
async fn test_health_degraded_on_database_failure() {
    let app = spawn_app().await;
    app.repository.set_failing(true);

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.json::<Value>()["checks"]["database"]["status"],
        "error"
    );
}

#[tokio::test]
async fn test_disabled_event_channel_is_healthy() {
    let app = spawn_app_with(MemoryBroker::new(), EventChannel::disabled());

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["checks"]["events"]["message"], "Event channel disabled");
    assert!(json["queues"]["url_clicks"].is_null());
}
