mod common;

use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use common::{OTHER_OWNER, OWNER, spawn_app};
use linkpulse::domain::events::EventChannelName;
use linkpulse::infrastructure::cache::CacheService;
use serde_json::{Value, json};

// ─── CREATE ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_url_returns_short_url() {
    let app = spawn_app().await;

    let body = app.create_url("https://example.com/a/long/path").await;

    let code = body["shortCode"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(body["shortUrl"], format!("http://sho.rt/{}", code));
    assert_eq!(body["originalUrl"], "https://example.com/a/long/path");
    assert_eq!(body["clicks"], 0);
    assert_eq!(body["isActive"], true);
    assert!(body["expiresAt"].is_null());
}

#[tokio::test]
async fn test_create_writes_through_and_publishes() {
    let app = spawn_app().await;

    let body = app.create_url("https://example.com").await;
    app.settle().await;

    let code = body["shortCode"].as_str().unwrap();
    let cached = app.cache.get_url(code).await.unwrap();
    assert_eq!(cached.unwrap().original_url, "https://example.com");

    assert_eq!(app.broker.ready_len(EventChannelName::UrlAnalytics), 1);
    assert_eq!(app.broker.ready_len(EventChannelName::UserActivities), 1);
}

#[tokio::test]
async fn test_create_with_custom_code() {
    let app = spawn_app().await;

    let body = app
        .create(
            OWNER,
            json!({ "originalUrl": "https://example.com", "customCode": "promo24" }),
        )
        .await;

    assert_eq!(body["shortCode"], "promo24");
}

#[tokio::test]
async fn test_create_duplicate_custom_code_is_conflict() {
    let app = spawn_app().await;
    app.create(
        OWNER,
        json!({ "originalUrl": "https://example.com", "customCode": "taken1" }),
    )
    .await;

    let response = app
        .server
        .post("/api/urls")
        .add_header("x-owner-id", OTHER_OWNER)
        .json(&json!({ "originalUrl": "https://other.com", "customCode": "taken1" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let json = response.json::<Value>();
    assert_eq!(json["error"]["code"], "code_conflict");
    assert_eq!(json["error"]["message"], "Custom short code already exists");
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let app = spawn_app().await;

    let cases = [
        json!({ "originalUrl": "not a url" }),
        json!({ "originalUrl": "ftp://example.com/file" }),
        json!({ "originalUrl": "https://example.com", "customCode": "no-dash" }),
        json!({ "originalUrl": "https://example.com", "customCode": "ab" }),
        json!({
            "originalUrl": "https://example.com",
            "expiresAt": (Utc::now() - ChronoDuration::hours(1)).to_rfc3339()
        }),
    ];

    for body in cases {
        let response = app
            .server
            .post("/api/urls")
            .add_header("x-owner-id", OWNER)
            .json(&body)
            .await;

        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["error"]["code"], "validation_error");
    }
}

#[tokio::test]
async fn test_missing_owner_is_unauthorized() {
    let app = spawn_app().await;

    let response = app
        .server
        .post("/api/urls")
        .json(&json!({ "originalUrl": "https://example.com" }))
        .await;
    response.assert_status_unauthorized();
    assert_eq!(response.json::<Value>()["error"]["code"], "unauthorized");

    app.server.get("/api/urls").await.assert_status_unauthorized();
}

// ─── LIST ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_is_paginated_and_owner_scoped() {
    let app = spawn_app().await;
    for i in 0..3 {
        app.create_url(&format!("https://example.com/{}", i)).await;
    }
    app.create(OTHER_OWNER, json!({ "originalUrl": "https://other.com" }))
        .await;

    let response = app
        .server
        .get("/api/urls")
        .add_query_param("page", 1)
        .add_query_param("limit", 2)
        .add_header("x-owner-id", OWNER)
        .await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["rows"].as_array().unwrap().len(), 2);
    assert_eq!(json["pagination"]["total"], 3);
    assert_eq!(json["pagination"]["totalPages"], 2);
    assert_eq!(json["rows"][0]["originalUrl"], "https://example.com/2");
    assert!(json["rows"][0]["shortUrl"]
        .as_str()
        .unwrap()
        .starts_with("http://sho.rt/"));
}

#[tokio::test]
async fn test_list_filters_by_active_flag() {
    let app = spawn_app().await;
    let first = app.create_url("https://example.com/1").await;
    app.create_url("https://example.com/2").await;

    app.server
        .put(&format!("/api/urls/{}", first["id"].as_str().unwrap()))
        .add_header("x-owner-id", OWNER)
        .json(&json!({ "isActive": false }))
        .await
        .assert_status_ok();
    app.settle().await;

    let response = app
        .server
        .get("/api/urls")
        .add_query_param("isActive", false)
        .add_header("x-owner-id", OWNER)
        .await;

    let json = response.json::<Value>();
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["rows"][0]["id"], first["id"]);
}

#[tokio::test]
async fn test_list_rejects_bad_pagination() {
    let app = spawn_app().await;

    for (page, limit) in [(0, 10), (1, 0), (1, 101)] {
        app.server
            .get("/api/urls")
            .add_query_param("page", page)
            .add_query_param("limit", limit)
            .add_header("x-owner-id", OWNER)
            .await
            .assert_status_bad_request();
    }
}

#[tokio::test]
async fn test_list_cache_is_invalidated_by_create() {
    let app = spawn_app().await;
    app.create_url("https://example.com/1").await;

    let list = |app: &common::TestApp| {
        app.server
            .get("/api/urls")
            .add_header("x-owner-id", OWNER)
    };

    assert_eq!(list(&app).await.json::<Value>()["pagination"]["total"], 1);
    app.settle().await;

    app.create_url("https://example.com/2").await;
    app.settle().await;

    assert_eq!(list(&app).await.json::<Value>()["pagination"]["total"], 2);
}

// ─── GET / UPDATE / DELETE ───────────────────────────────────────────────────

#[tokio::test]
async fn test_other_owner_sees_not_found() {
    let app = spawn_app().await;
    let created = app.create_url("https://example.com").await;
    let path = format!("/api/urls/{}", created["id"].as_str().unwrap());

    app.server
        .get(&path)
        .add_header("x-owner-id", OWNER)
        .await
        .assert_status_ok();

    let foreign = app.server.get(&path).add_header("x-owner-id", OTHER_OWNER).await;
    foreign.assert_status_not_found();

    let missing = app
        .server
        .get(&format!("/api/urls/{}", uuid::Uuid::new_v4()))
        .add_header("x-owner-id", OWNER)
        .await;
    missing.assert_status_not_found();

    assert_eq!(
        foreign.json::<Value>()["error"]["message"],
        missing.json::<Value>()["error"]["message"]
    );

    app.server
        .put(&path)
        .add_header("x-owner-id", OTHER_OWNER)
        .json(&json!({ "isActive": false }))
        .await
        .assert_status_not_found();
    app.server
        .delete(&path)
        .add_header("x-owner-id", OTHER_OWNER)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_update_changes_destination() {
    let app = spawn_app().await;
    let created = app.create_url("https://old.example.com").await;
    let code = created["shortCode"].as_str().unwrap().to_string();
    app.settle().await;

    let response = app
        .server
        .put(&format!("/api/urls/{}", created["id"].as_str().unwrap()))
        .add_header("x-owner-id", OWNER)
        .json(&json!({ "originalUrl": "https://new.example.com" }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["originalUrl"], "https://new.example.com");
    app.settle().await;

    let redirect = app.server.get(&format!("/{}", code)).await;
    assert_eq!(redirect.status_code(), StatusCode::FOUND);
    assert_eq!(redirect.header("location"), "https://new.example.com");
}

#[tokio::test]
async fn test_update_with_empty_body_is_rejected() {
    let app = spawn_app().await;
    let created = app.create_url("https://example.com").await;

    app.server
        .put(&format!("/api/urls/{}", created["id"].as_str().unwrap()))
        .add_header("x-owner-id", OWNER)
        .json(&json!({}))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_update_can_clear_expiry() {
    let app = spawn_app().await;
    let expires = (Utc::now() + ChronoDuration::days(1)).to_rfc3339();
    let created = app
        .create(
            OWNER,
            json!({ "originalUrl": "https://example.com", "expiresAt": expires }),
        )
        .await;
    assert!(!created["expiresAt"].is_null());

    let response = app
        .server
        .put(&format!("/api/urls/{}", created["id"].as_str().unwrap()))
        .add_header("x-owner-id", OWNER)
        .json(&json!({ "expiresAt": null }))
        .await;

    response.assert_status_ok();
    assert!(response.json::<Value>()["expiresAt"].is_null());
}

#[tokio::test]
async fn test_delete_removes_url_and_cache_entry() {
    let app = spawn_app().await;
    let created = app.create_url("https://example.com").await;
    let code = created["shortCode"].as_str().unwrap().to_string();
    let path = format!("/api/urls/{}", created["id"].as_str().unwrap());
    app.settle().await;
    assert!(app.cache.get_url(&code).await.unwrap().is_some());

    let response = app.server.delete(&path).add_header("x-owner-id", OWNER).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["shortCode"], code.as_str());
    app.settle().await;

    assert!(app.cache.get_url(&code).await.unwrap().is_none());
    app.server
        .get(&path)
        .add_header("x-owner-id", OWNER)
        .await
        .assert_status_not_found();
    app.server
        .get(&format!("/{}", code))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_reused_code_starts_with_fresh_cached_clicks() {
    let app = spawn_app().await;
    let created = app
        .create(
            OWNER,
            json!({ "originalUrl": "https://example.com/old", "customCode": "promo" }),
        )
        .await;
    for _ in 0..3 {
        app.server.get("/promo").await;
    }
    app.settle().await;
    assert_eq!(app.service.cached_click_count("promo").await, 3);

    app.server
        .delete(&format!("/api/urls/{}", created["id"].as_str().unwrap()))
        .add_header("x-owner-id", OWNER)
        .await
        .assert_status_ok();
    app.settle().await;

    let reused = app
        .create(
            OTHER_OWNER,
            json!({ "originalUrl": "https://example.com/new", "customCode": "promo" }),
        )
        .await;
    app.settle().await;

    let json = app
        .server
        .get(&format!("/api/urls/{}/analytics", reused["id"].as_str().unwrap()))
        .add_header("x-owner-id", OTHER_OWNER)
        .await
        .json::<Value>();
    assert_eq!(json["clicks"], 0);
    assert_eq!(json["cachedClicks"], 0);
}

// ─── ANALYTICS ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_analytics_reports_store_and_cache_clicks() {
    let app = spawn_app().await;
    let created = app.create_url("https://example.com").await;
    let code = created["shortCode"].as_str().unwrap().to_string();

    for _ in 0..3 {
        app.server.get(&format!("/{}", code)).await;
    }
    app.settle().await;

    let response = app
        .server
        .get(&format!("/api/urls/{}/analytics", created["id"].as_str().unwrap()))
        .add_header("x-owner-id", OWNER)
        .await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["clicks"], 3);
    assert_eq!(json["cachedClicks"], 3);
    assert_eq!(json["shortUrl"], format!("http://sho.rt/{}", code));
}

#[tokio::test]
async fn test_analytics_is_owner_scoped() {
    let app = spawn_app().await;
    let created = app.create_url("https://example.com").await;
    let path = format!("/api/urls/{}/analytics", created["id"].as_str().unwrap());

    app.server
        .get(&path)
        .add_header("x-owner-id", OWNER)
        .await
        .assert_status_ok();
    app.settle().await;

    app.server
        .get(&path)
        .add_header("x-owner-id", OTHER_OWNER)
        .await
        .assert_status_not_found();
}
