use thiserror::Error;

/// A rule on user-supplied data that the input broke.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
