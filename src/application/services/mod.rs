//! Business logic services for the application layer.

pub mod side_effects;
pub mod url_service;

pub use side_effects::{EffectError, SideEffects};
pub use url_service::{CreateUrl, UrlService};
