use crate::domain::error::DomainError;

pub const USERNAME_MAX_CHARS: usize = 150;

/// Usernames may contain letters, digits and `@ . + - _`.
pub fn validate_username(raw: &str) -> Result<String, DomainError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username", "username is required"));
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Err(DomainError::validation(
            "username",
            format!("username exceeds {USERNAME_MAX_CHARS} characters"),
        ));
    }
    if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(DomainError::validation(
            "username",
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }
    // `/profile/./` and `/profile/../` are collapsed by clients before routing.
    if matches!(username, "." | "..") {
        return Err(DomainError::validation(
            "username",
            "username cannot be a path segment alias",
        ));
    }
    Ok(username.to_string())
}
