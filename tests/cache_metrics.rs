use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
    middleware,
    routing::get,
};
use bytes::Bytes;
use metrics_util::debugging::DebuggingRecorder;
use tower::ServiceExt;
use yatube::cache::{
    CacheConfig, CacheKey, CacheState, CachedResponse, INDEX_PAGE_PREFIX, PageCache,
    metrics::{
        PAGE_CACHE_ENTRIES, PAGE_CACHE_EVICT, PAGE_CACHE_EXPIRED, PAGE_CACHE_HIT, PAGE_CACHE_MISS,
    },
    page_cache_layer,
};

fn rendered(body: &'static str) -> CachedResponse {
    CachedResponse {
        status: 200,
        headers: vec![("content-type".into(), "text/html; charset=utf-8".into())],
        body: Bytes::from_static(body.as_bytes()),
    }
}

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Store level: eviction and expiry
    let small = PageCache::new(&CacheConfig {
        capacity: 1,
        index_timeout: Duration::from_secs(20),
        ..CacheConfig::default()
    });
    let start = Instant::now();
    small.set_at(CacheKey::index_page(None, "/"), rendered("one"), start);
    small.set_at(CacheKey::index_page(None, "/?page=2"), rendered("two"), start);
    assert!(
        small
            .get_at(
                &CacheKey::index_page(None, "/?page=2"),
                start + Duration::from_secs(21)
            )
            .is_none()
    );

    // Middleware level: miss, then hit
    let config = CacheConfig::default();
    let store = Arc::new(PageCache::new(&config));
    let state = CacheState::new(config, store, INDEX_PAGE_PREFIX);
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/",
        get({
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "latest posts"
                }
            }
        })
        .layer(middleware::from_fn_with_state(state, page_cache_layer)),
    );

    for _ in 0..2 {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Body::empty())
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        PAGE_CACHE_HIT,
        PAGE_CACHE_MISS,
        PAGE_CACHE_EVICT,
        PAGE_CACHE_EXPIRED,
        PAGE_CACHE_ENTRIES,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
