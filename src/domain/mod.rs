//! Domain layer containing business entities and contracts.
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`events`] - Payloads published on the event channel
//!
//! The domain layer has no dependencies on infrastructure or presentation layers.

pub mod entities;
pub mod events;
pub mod repositories;
