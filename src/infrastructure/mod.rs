//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for persistence, caching and event transport.
//!
//! # Modules
//!
//! - [`cache`] - Cache-aside layer (Redis, in-memory and no-op implementations)
//! - [`events`] - Reconnecting event channel and its transports
//! - [`persistence`] - PostgreSQL and in-memory repository implementations

pub mod cache;
pub mod events;
pub mod persistence;
