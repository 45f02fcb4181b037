//! Create and update through the cache.

use std::time::Duration;

use hal_cache::{HalCache, HalCacheError};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn cache_for(server: &MockServer) -> HalCache {
    HalCache::builder()
        .api_root(server.uri())
        .build()
        .expect("cache should build")
}

async fn requests(server: &MockServer, verb: &str, p: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == p)
        .count()
}

/// The created entity comes from the POST response, not from a follow-up GET.
#[tokio::test]
async fn test_post_returns_created_entity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/books"))
        .and(body_json(json!({ "title": "New" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_links": {
                "self": { "href": "/books/7" },
                "author": { "href": "/authors/1" }
            },
            "title": "New"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    let created = cache.post("/books", &json!({ "title": "New" })).await.unwrap();

    assert!(!created.is_loading());
    assert_eq!(created.self_uri(), Some("/books/7"));
    assert_eq!(created.property("title"), Some(&json!("New")));
    assert_eq!(requests(&server, "GET", "/books/7").await, 0);
    // the collection itself is not touched
    assert!(cache.is_unknown("/books"));
}

#[tokio::test]
async fn test_post_failure_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/books"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    let err = cache.post("/books", &json!({})).await.unwrap_err();
    assert!(matches!(err, HalCacheError::Forbidden { .. }));
}

/// Patching an unknown entity shows a placeholder for the duration of the
/// request and never issues a GET.
#[tokio::test]
async fn test_patch_unknown_entity_uses_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/books/1"))
        .and(body_json(json!({ "title": "Changed" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "_links": { "self": { "href": "/books/1" } },
                    "title": "Changed"
                }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    let patching = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.patch("/books/1", &json!({ "title": "Changed" })).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let during = cache.get("/books/1").unwrap();
    assert!(during.is_loading());

    let updated = patching.await.unwrap().unwrap();
    assert_eq!(updated.property("title"), Some(&json!("Changed")));
    assert!(!updated.meta().loading);

    let resolved = during.loaded().await.unwrap().unwrap();
    assert_eq!(resolved.property("title"), Some(&json!("Changed")));
    assert_eq!(requests(&server, "GET", "/books/1").await, 0);
}

#[tokio::test]
async fn test_patch_known_entity_merges_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_links": { "self": { "href": "/books/1" } },
            "title": "Old",
            "pages": 100
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/books/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_links": { "self": { "href": "/books/1" } },
            "title": "New",
            "pages": 100
        })))
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    cache.get("/books/1").unwrap().loaded().await.unwrap();

    let updated = cache.patch("/books/1", &json!({ "title": "New" })).await.unwrap();
    assert_eq!(updated.property("title"), Some(&json!("New")));
    assert_eq!(
        cache.snapshot("/books/1").unwrap().field("title"),
        Some(&json!("New"))
    );
}

/// A rejected patch of an unknown entity removes the placeholder again.
#[tokio::test]
async fn test_rejected_patch_discards_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/books/1"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "title": "Unprocessable",
            "violations": [{ "propertyPath": "title" }]
        })))
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    let err = cache.patch("/books/1", &json!({ "title": "" })).await.unwrap_err();

    let response = err.response().expect("response retained");
    assert_eq!(response.status, 422);
    assert_eq!(response.body["violations"][0]["propertyPath"], "title");
    assert!(cache.is_unknown("/books/1"));
}

/// With `force_requested_self_link`, a response is stored under the URI
/// that was asked for, whatever its own self link says.
#[tokio::test]
async fn test_force_requested_self_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_links": { "self": { "href": "/books/1" } },
            "title": "Foo"
        })))
        .mount(&server)
        .await;

    let cache = HalCache::builder()
        .api_root(server.uri())
        .force_requested_self_link(true)
        .build()
        .unwrap();

    let loaded = cache
        .get("/books/current")
        .unwrap()
        .loaded()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.self_uri(), Some("/books/current"));
    assert_eq!(loaded.property("title"), Some(&json!("Foo")));
    assert!(cache.is_unknown("/books/1"));
}

#[tokio::test]
async fn test_mutations_require_a_uri() {
    let server = MockServer::start().await;
    let cache = cache_for(&server).await;

    let anonymous = cache.get("/books/1").unwrap().relation("author").unwrap();
    let err = cache.delete(&anonymous).await.unwrap_err();
    assert!(matches!(
        err,
        HalCacheError::Unidentifiable { operation: "DELETE", .. }
    ));
}
