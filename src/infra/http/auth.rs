//! Cookie sessions: request extractors plus the login and logout pages.

use std::convert::Infallible;

use axum::{
    Form,
    extract::{FromRequestParts, Query, State},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{info, warn};
use url::form_urlencoded;

use crate::application::auth::{AuthError, Principal};
use crate::application::error::HttpError;
use crate::presentation::views::{
    LayoutContext, LoginTemplate, LoginView, render_template_response,
};

use super::public::HttpState;

pub const SESSION_COOKIE: &str = "yatube_session";
pub const LOGIN_PATH: &str = "/auth/login/";

const SOURCE: &str = "infra::http::auth";
const INVALID_LOGIN_MESSAGE: &str = "Пожалуйста, введите правильные имя пользователя и пароль. Оба поля могут быть чувствительны к регистру.";

/// The signed-in user, if any.
pub struct Viewer(pub Option<Principal>);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}

/// Rejects anonymous requests with a redirect to the login page.
pub struct RequireUser(pub Principal);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(principal) => Ok(Self(principal.clone())),
            None => Err(login_redirect(&parts.uri)),
        }
    }
}

/// `/auth/login/?next=<path and query>`, keeping `/` unescaped.
pub fn login_url(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={}", encoded.replace("%2F", "/"))
}

fn login_redirect(uri: &Uri) -> Redirect {
    let next = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or_else(|| uri.path());
    Redirect::to(&login_url(next))
}

/// Only local absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(next)
            if next.starts_with('/')
                && !next.starts_with("//")
                && !next.contains('\\')
                && next.chars().all(|ch| ch.is_ascii_graphic()) =>
        {
            next.to_string()
        }
        _ => "/".to_string(),
    }
}

pub(super) fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

pub(super) async fn login_page(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<LoginQuery>,
) -> Response {
    let view = LoginView {
        username: String::new(),
        next: safe_next(query.next.as_deref()),
        error: String::new(),
    };
    render_login(&state, viewer, view)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref());

    match state.auth.login(&form.username, &form.password).await {
        Ok(issued) => {
            info!(
                target = "yatube::http::auth",
                user_id = issued.principal.user_id,
                username = %issued.principal.username,
                "session started"
            );
            let cookie = Cookie::build((SESSION_COOKIE, issued.token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(state.secure_cookies)
                .max_age(state.auth.session_ttl());
            (jar.add(cookie), Redirect::to(&next)).into_response()
        }
        Err(AuthError::InvalidCredentials) => {
            let view = LoginView {
                username: form.username,
                next,
                error: INVALID_LOGIN_MESSAGE.to_string(),
            };
            render_login(&state, viewer, view)
        }
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Login failed",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(token) = session_token(&jar)
        && let Err(err) = state.auth.logout(&token).await
    {
        warn!(target = "yatube::http::auth", error = %err, "failed to revoke session");
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/")).into_response()
}

fn render_login(state: &HttpState, viewer: Viewer, view: LoginView) -> Response {
    let chrome = state.chrome.load(viewer.0.as_ref());
    let view = LayoutContext::new(chrome, "Войти", view);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}
