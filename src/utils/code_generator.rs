//! Short code generation and validation utilities.
//!
//! Generated codes are drawn uniformly from the 62-symbol alphanumeric alphabet.
//! Uniqueness is not guaranteed here; it is enforced by the store.

use crate::error::AppError;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::json;
use std::ops::RangeInclusive;

/// Length of generated codes when none is configured.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Allowed length for any short code, generated or custom.
pub const CODE_LENGTH_RANGE: RangeInclusive<usize> = 3..=10;

/// Codes that would shadow HTTP routes.
const RESERVED_CODES: &[&str] = &["api", "health"];

/// Generates a random alphanumeric code of `length` characters.
///
/// `length` is clamped into [`CODE_LENGTH_RANGE`].
///
/// # Examples
///
/// ```ignore
/// let code = generate_code(6);
/// assert_eq!(code.len(), 6);
/// assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_code(length: usize) -> String {
    let length = length.clamp(*CODE_LENGTH_RANGE.start(), *CODE_LENGTH_RANGE.end());

    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Returns true if `code` collides with a top-level route.
pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES.iter().any(|r| r.eq_ignore_ascii_case(code))
}

/// Validates a caller-supplied short code.
///
/// # Rules
///
/// - Length: 3-10 characters
/// - Allowed characters: ASCII letters and digits
/// - Cannot be a reserved route name
///
/// # Errors
///
/// Returns [`AppError::Validation`] if any rule is violated.
pub fn validate_custom_code(code: &str) -> Result<(), AppError> {
    if !CODE_LENGTH_RANGE.contains(&code.len()) {
        return Err(AppError::bad_request(
            "Custom short code must be 3-10 characters",
            json!({ "provided_length": code.len() }),
        ));
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::bad_request(
            "Custom short code can only contain letters and digits",
            json!({ "code": code }),
        ));
    }

    if is_reserved(code) {
        return Err(AppError::bad_request(
            "This short code is reserved",
            json!({ "code": code }),
        ));
    }

    Ok(())
}
