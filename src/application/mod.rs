//! Application layer services implementing business logic.
//!
//! This layer orchestrates domain operations by coordinating the repository,
//! the cache and the event channel. Handlers call into it and never touch
//! infrastructure directly.
//!
//! # Available Services
//!
//! - [`services::url_service::UrlService`] - Short URL lifecycle and redirects
//! - [`services::side_effects::SideEffects`] - Best-effort cache and event work

pub mod services;
