mod support;

use std::collections::HashSet;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use metrics_util::debugging::DebuggingRecorder;
use tower::ServiceExt;

use bistro::infra::http::{RateLimitPolicy, build_router};

use support::test_app;

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = test_app(RateLimitPolicy::new(1, 60));
    let cache = app.state.cache.clone();

    // Region miss, then hit.
    assert_eq!(cache.dishes.get_cached().await, None);
    assert!(cache.dishes.put(&[]).await);
    assert_eq!(cache.dishes.get_cached().await, Some(Vec::new()));

    // Unreachable store.
    app.backend.set_available(false);
    assert_eq!(cache.tables.get_cached_all().await, None);
    app.backend.set_available(true);

    // Rate-limit rejection through the router.
    let router = build_router(app.state.clone());
    let mut statuses = Vec::new();
    for _ in 0..2 {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .expect("request should build");
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        statuses.push(response.status());
    }
    assert_eq!(statuses, [StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "bistro_cache_hit_total",
        "bistro_cache_miss_total",
        "bistro_cache_store_unavailable_total",
        "bistro_rate_limit_rejected_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
