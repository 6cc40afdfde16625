//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{code}`      - Short URL redirect (public)
//! - `GET  /health`      - Health check: database, cache, event channel (public)
//! - `/api/*`            - URL management API (`X-Owner-Id` required)
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{health_handler, redirect_handler};
use crate::api::middleware::tracing;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
///
/// Owner identity is resolved per handler by the
/// [`crate::api::middleware::OwnerId`] extractor, so no route layer is needed
/// for authorization.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    let router = Router::new()
        .route("/{code}", get(redirect_handler))
        .route("/health", get(health_handler))
        .nest("/api", api::routes::owner_routes())
        .with_state(state)
        .layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
