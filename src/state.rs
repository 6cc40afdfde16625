//! Shared application state injected into handlers.

use std::sync::Arc;

use crate::application::services::UrlService;

/// State shared by every request handler.
///
/// The repository, cache and event channel are reached through the service so
/// handlers and health checks observe the same instances.
#[derive(Clone)]
pub struct AppState {
    pub url_service: Arc<UrlService>,
}

impl AppState {
    pub fn new(url_service: Arc<UrlService>) -> Self {
        Self { url_service }
    }
}
