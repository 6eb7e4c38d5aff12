use std::time::Instant;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::{
    auth::{Principal, SessionAuthError},
    error::ErrorReport,
};

use super::auth::session_token;
use super::public::HttpState;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Attach the session's `Principal` to the request when the cookie is valid.
pub async fn resolve_session(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = session_token(&jar) {
        match state.auth.authenticate(&token).await {
            Ok(principal) => {
                request.extensions_mut().insert(principal);
            }
            Err(SessionAuthError::Unavailable) => {
                warn!(
                    target = "yatube::http::session",
                    "session lookup failed; serving request anonymously"
                );
            }
            Err(err) => {
                debug!(target = "yatube::http::session", error = %err, "session ignored");
            }
        }
    }

    next.run(request).await
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let (user_id, username) = match request.extensions().get::<Principal>() {
        Some(principal) => (Some(principal.user_id), Some(principal.username.clone())),
        None => (None, None),
    };

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user_id = user_id.unwrap_or_default(),
                username = username.as_deref().unwrap_or(""),
                "request failed",
            );
        } else {
            warn!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                request_id = request_id,
                user_id = user_id.unwrap_or_default(),
                username = username.as_deref().unwrap_or(""),
                "client request error",
            );
        }
    }

    response
}
