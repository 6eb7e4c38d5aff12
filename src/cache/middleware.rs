//! Response cache middleware.
//!
//! Serves a stored copy of successful GET responses until the entry expires.
//! Responses that set cookies or fail are never stored.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum::body::HttpBody;
use http_body_util::BodyExt;
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::application::auth::Principal;

use super::{CacheConfig, L1Key, L1Store, store::CachedResponse};

/// Shared cache state for middleware and explicit invalidation.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub l1: Arc<L1Store>,
}

impl CacheState {
    pub fn new(config: CacheConfig) -> Self {
        let l1 = Arc::new(L1Store::new(&config));
        Self { config, l1 }
    }

    /// Clear every cached response; the next request renders fresh content.
    pub fn invalidate_all(&self) {
        self.l1.invalidate_all();
        debug!(cache = "l1", "response cache cleared");
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer = request
        .extensions()
        .get::<Principal>()
        .map(|principal| principal.user_id);
    let key = L1Key::new(
        &cache.config.key_prefix,
        request.uri().path(),
        request.uri().query().unwrap_or(""),
        viewer,
    );

    if let Some(cached) = cache.l1.get(&key) {
        counter!("yatube_cache_response_hit_total").increment(1);
        debug!(cache = "l1", outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    counter!("yatube_cache_response_miss_total").increment(1);
    debug!(cache = "l1", outcome = "miss", "cache miss, executing handler");

    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let max_body_bytes = cache.config.max_body_bytes;
    if body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper > max_body_bytes as u64)
    {
        counter!("yatube_cache_response_oversized_total").increment(1);
        debug!(cache = "l1", outcome = "oversized", "response too large to cache");
        return Response::from_parts(parts, body);
    }

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(cache = "l1", error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if bytes.len() > max_body_bytes {
        counter!("yatube_cache_response_oversized_total").increment(1);
        debug!(cache = "l1", outcome = "oversized", "response too large to cache");
        return Response::from_parts(parts, Body::from(bytes));
    }

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };
    cache.l1.set(key, cached, cache.config.index_ttl);

    Response::from_parts(parts, Body::from(bytes))
}

fn should_store_response(response: &Response) -> bool {
    response.status() == StatusCode::OK && !response.headers().contains_key(header::SET_COOKIE)
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);
    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
