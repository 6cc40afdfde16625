//! HTTP middleware and extractors for request processing.
//!
//! Provides caller identity extraction and observability middleware.

pub mod owner;
pub mod tracing;

pub use owner::{OWNER_HEADER, OwnerId};
