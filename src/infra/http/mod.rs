mod auth;
mod middleware;
mod public;

pub use auth::{LOGIN_PATH, SESSION_COOKIE, login_url};
pub use public::{HttpState, build_router};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sqlx::Error as SqlxError;

use crate::application::error::ErrorReport;
use crate::infra::db::PostgresRepositories;

/// Liveness probe for the backing database, served at `/_health/db`.
#[async_trait]
pub trait DatabaseHealth: Send + Sync {
    async fn check(&self) -> Result<(), SqlxError>;
}

#[async_trait]
impl DatabaseHealth for PostgresRepositories {
    async fn check(&self) -> Result<(), SqlxError> {
        self.health_check().await
    }
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
