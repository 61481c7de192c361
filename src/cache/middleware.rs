//! Page cache middleware.
//!
//! Wraps a single route. GET renders that come back `200 OK` without a
//! `Set-Cookie` header are stored and replayed verbatim until the timeout.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

use super::{CacheConfig, CacheKey, PageCache, store::CachedResponse};
use crate::infra::http::identity::REMOTE_USER_HEADER;

const MAX_CACHED_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<PageCache>,
    pub prefix: &'static str,
}

impl CacheState {
    pub fn new(config: CacheConfig, store: Arc<PageCache>, prefix: &'static str) -> Self {
        Self {
            config,
            store,
            prefix,
        }
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer = request
        .headers()
        .get(REMOTE_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let target = request
        .uri()
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let key = CacheKey::new(cache.prefix, viewer.as_deref(), &target);

    if let Some(cached) = cache.store.get(&key) {
        return build_response(cached);
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || response.headers().contains_key(header::SET_COOKIE)
    {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(cache = "page", error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect(),
        body: bytes.clone(),
    };

    debug!(cache = "page", key = %key, bytes = bytes.len(), "caching response");
    cache.store.set(key, cached);

    Response::from_parts(parts, Body::from(bytes))
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

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::cache::INDEX_PAGE_PREFIX;

    fn counting_router(config: CacheConfig, hits: Arc<AtomicUsize>) -> (Router, Arc<PageCache>) {
        let store = Arc::new(PageCache::new(&config));
        let state = CacheState::new(config, store.clone(), INDEX_PAGE_PREFIX);
        let handler = move || {
            let hits = hits.clone();
            async move {
                let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                format!("render {n}")
            }
        };
        let router = Router::new().route(
            "/",
            get(handler).layer(middleware::from_fn_with_state(state, page_cache_layer)),
        );
        (router, store)
    }

    async fn body_of(router: &Router, uri: &str, user: Option<&str>) -> String {
        let mut request = Request::builder().uri(uri);
        if let Some(user) = user {
            request = request.header(REMOTE_USER_HEADER, user);
        }
        let response = router
            .clone()
            .oneshot(request.body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn second_render_is_replayed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (router, store) = counting_router(CacheConfig::default(), hits.clone());

        assert_eq!(body_of(&router, "/", None).await, "render 1");
        assert_eq!(body_of(&router, "/", None).await, "render 1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        store.clear();
        assert_eq!(body_of(&router, "/", None).await, "render 2");
    }

    #[tokio::test]
    async fn viewers_and_pages_get_separate_entries() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (router, store) = counting_router(CacheConfig::default(), hits.clone());

        body_of(&router, "/", None).await;
        body_of(&router, "/", Some("auth")).await;
        body_of(&router, "/?page=2", None).await;

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn disabled_cache_always_renders() {
        let hits = Arc::new(AtomicUsize::new(0));
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let (router, store) = counting_router(config, hits.clone());

        body_of(&router, "/", None).await;
        body_of(&router, "/", None).await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
    }
}
