//! Field rules for posts, comments and groups.

use crate::domain::error::DomainError;

pub const GROUP_TITLE_MAX_CHARS: usize = 200;

/// Trim surrounding whitespace and reject blank input.
pub fn normalize_required_text(field: &'static str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "Обязательное поле."));
    }
    Ok(trimmed.to_string())
}

pub fn validate_group_title(raw: &str) -> Result<String, DomainError> {
    let title = normalize_required_text("title", raw)?;
    let length = title.chars().count();
    if length > GROUP_TITLE_MAX_CHARS {
        return Err(DomainError::validation(
            "title",
            format!(
                "Убедитесь, что это значение содержит не более {GROUP_TITLE_MAX_CHARS} символов (сейчас {length})."
            ),
        ));
    }
    Ok(title)
}
