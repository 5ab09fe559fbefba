//! Dish name validation
//!
//! Shared rule applied before a request is accepted: the name must be
//! non-empty after trimming, at most 100 characters, and contain only
//! letters, digits, whitespace, and common food-name punctuation.

use crate::{Error, Result};

/// Maximum accepted dish name length in characters
pub const MAX_NAME_LEN: usize = 100;

/// Punctuation accepted inside dish names
const ALLOWED_PUNCTUATION: &[char] = &['\'', '-', ',', '.', '&', '(', ')'];

/// Validate a submitted dish name, returning the trimmed form on success
pub fn validate_dish_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "Dish name must not be empty".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "Dish name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }

    if let Some(bad) = trimmed.chars().find(|c| !is_allowed_char(*c)) {
        return Err(Error::InvalidInput(format!(
            "Dish name contains unsupported character: {:?}",
            bad
        )));
    }

    Ok(trimmed)
}

fn is_allowed_char(c: char) -> bool {
    c.is_alphanumeric()
        || (c.is_whitespace() && !c.is_control())
        || ALLOWED_PUNCTUATION.contains(&c)
}
