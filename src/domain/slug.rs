//! Group slug derivation and validation.
//!
//! Slugs are the route key of a group (`/group/<slug>/`), so they are limited
//! to ASCII letters, digits, hyphens and underscores.

use slug::slugify;
use thiserror::Error;

pub const SLUG_MAX_CHARS: usize = 255;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` contains characters other than letters, digits, `-` or `_`")]
    InvalidCharacters { slug: String },
    #[error("slug exceeds 255 characters")]
    TooLong,
}

/// Derive a slug from a human-readable title, transliterating non-ASCII text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }
    candidate.truncate(SLUG_MAX_CHARS);
    let candidate = candidate.trim_end_matches('-').to_string();

    Ok(candidate)
}

/// Check an explicitly supplied slug.
pub fn validate_slug(raw: &str) -> Result<String, SlugError> {
    let slug = raw.trim();
    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if slug.chars().count() > SLUG_MAX_CHARS {
        return Err(SlugError::TooLong);
    }
    if !slug
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(SlugError::InvalidCharacters {
            slug: slug.to_string(),
        });
    }
    Ok(slug.to_string())
}
