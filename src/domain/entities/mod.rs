//! Core domain entities.
//!
//! Entities are plain data structures. Separate structs carry creation
//! ([`NewShortUrl`]) and partial-update ([`ShortUrlPatch`]) inputs.

pub mod short_url;

pub use short_url::{
    ListQuery, NewShortUrl, Pagination, ShortUrl, ShortUrlPatch, UrlAnalytics, UrlPage,
};
