//! Error plumbing shared by handlers and the binary.
//!
//! Handlers turn failures into an `HttpError`, which renders a short public
//! message and stashes an `ErrorReport` in the response extensions. The
//! response logging middleware picks the report up and logs the full chain.

use std::error::Error as StdError;
use std::iter;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{application::repos::RepoError, infra::error::InfraError};

/// Diagnostic attached to failed responses for `log_responses`.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    /// Outermost error first, followed by each `source()`.
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        error: &(dyn StdError + 'static),
    ) -> Self {
        let messages = iter::successors(Some(error), |&current| current.source())
            .map(ToString::to_string)
            .collect();
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// A failed request: what the visitor sees plus what gets logged.
#[derive(Debug)]
pub struct HttpError {
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            public_message,
            report: ErrorReport::from_message(source, status, detail),
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &(dyn StdError + 'static),
    ) -> Self {
        Self {
            public_message,
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.report.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.report.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    let (status, public_message) = match &err {
        RepoError::NotFound => (StatusCode::NOT_FOUND, "Not found"),
        RepoError::Duplicate { .. } | RepoError::Integrity { .. } => {
            (StatusCode::CONFLICT, "Conflicting record")
        }
        RepoError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "Invalid input"),
        RepoError::Timeout => (StatusCode::SERVICE_UNAVAILABLE, "Database timeout"),
        RepoError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Storage failure"),
    };
    HttpError::from_error(source, status, public_message, &err)
}

/// Failure that ends the process: startup, configuration or a CLI command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("{0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
