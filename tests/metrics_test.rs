//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter. Loads run in spawned
//! tasks, so each test drives a current-thread runtime inside the local
//! recorder scope to keep every task on the recording thread.

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hal_cache::{HalCache, telemetry};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` carrying label `label` = `value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn entity(uri: &str) -> serde_json::Value {
    json!({ "_links": { "self": { "href": uri } } })
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn successful_fetch_records_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio_test::block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/books/1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(entity("/books/1")))
                .mount(&server)
                .await;

            let cache = HalCache::builder().api_root(server.uri()).build().unwrap();
            let first = cache.get("/books/1").unwrap();
            let second = cache.get("/books/1").unwrap();
            first.loaded().await.unwrap();
            second.loaded().await.unwrap();
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, "status", "ok"),
        1,
        "expected one successful fetch"
    );
    assert!(
        has_histogram(&snapshot, telemetry::FETCH_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::DEDUP_HITS_TOTAL),
        1,
        "second get should join the first"
    );
}

#[test]
fn failed_fetch_records_error_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio_test::block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/books/1"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let cache = HalCache::builder().api_root(server.uri()).build().unwrap();
            let _ = cache.get("/books/1").unwrap().loaded().await;
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, "status", "error"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, "operation", "get"),
        1
    );
}

#[test]
fn delete_records_cascade_and_purge_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio_test::block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/books/1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "_links": {
                        "self": { "href": "/books/1" },
                        "author": { "href": "/authors/1" }
                    }
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/authors/1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(entity("/authors/1")))
                .mount(&server)
                .await;
            Mock::given(method("DELETE"))
                .and(path("/authors/1"))
                .respond_with(ResponseTemplate::new(204))
                .mount(&server)
                .await;

            let cache = HalCache::builder().api_root(server.uri()).build().unwrap();
            cache.get("/books/1").unwrap().loaded().await.unwrap();
            cache.get("/authors/1").unwrap().loaded().await.unwrap();
            cache.delete("/authors/1").await.unwrap();
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::CASCADE_RELOADS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::PURGES_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, "operation", "delete"),
        1
    );
}

#[test]
fn purge_all_counts_every_cleared_entry() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio_test::block_on(async {
            let server = MockServer::start().await;
            for uri in ["/books/1", "/books/2"] {
                Mock::given(method("GET"))
                    .and(path(uri))
                    .respond_with(ResponseTemplate::new(200).set_body_json(entity(uri)))
                    .mount(&server)
                    .await;
            }

            let cache = HalCache::builder().api_root(server.uri()).build().unwrap();
            cache.get("/books/1").unwrap().loaded().await.unwrap();
            cache.get("/books/2").unwrap().loaded().await.unwrap();
            cache.purge_all();
            assert!(cache.is_unknown("/books/1"));
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::PURGES_TOTAL), 2);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entity("/books/1")))
        .mount(&server)
        .await;

    let cache = HalCache::builder().api_root(server.uri()).build().unwrap();
    cache.get("/books/1").unwrap().loaded().await.unwrap();
}
