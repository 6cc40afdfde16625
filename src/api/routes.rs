//! API route configuration.
//!
//! Every endpoint here acts on behalf of the caller named in `X-Owner-Id`
//! (see [`crate::api::middleware::OwnerId`]).

use crate::api::handlers::{
    analytics_handler, create_url_handler, delete_url_handler, get_url_handler, list_urls_handler,
    update_url_handler,
};
use crate::state::AppState;
use axum::{Router, routing::get};

/// Owner-scoped URL management routes.
///
/// # Endpoints
///
/// - `POST   /urls`                 - Create a short URL
/// - `GET    /urls`                 - List the caller's URLs (paginated)
/// - `GET    /urls/{id}`            - Fetch one URL
/// - `PUT    /urls/{id}`            - Update destination, active flag or expiry
/// - `DELETE /urls/{id}`            - Delete a URL
/// - `GET    /urls/{id}/analytics`  - Analytics snapshot for a URL
pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/urls", get(list_urls_handler).post(create_url_handler))
        .route(
            "/urls/{id}",
            get(get_url_handler)
                .put(update_url_handler)
                .delete(delete_url_handler),
        )
        .route("/urls/{id}/analytics", get(analytics_handler))
}
