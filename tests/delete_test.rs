//! Delete protocol, delete completion cascade and not-found self-healing.

use std::time::Duration;

use hal_cache::{Facade, HalCache, StoreEvent};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entity(self_uri: &str, links: Value) -> Value {
    let mut links = links.as_object().cloned().unwrap_or_default();
    links.insert("self".to_string(), json!({ "href": self_uri }));
    json!({ "_links": links })
}

async fn cache_for(server: &MockServer) -> HalCache {
    HalCache::builder()
        .api_root(server.uri())
        .build()
        .expect("cache should build")
}

async fn requests_to(server: &MockServer, verb: &str, p: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == p)
        .count()
}

async fn mount_get(server: &MockServer, p: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn load(cache: &HalCache, uri: &str) -> Facade {
    cache
        .get(uri)
        .unwrap()
        .loaded()
        .await
        .expect("load should succeed")
        .expect("entity should resolve")
}

/// Wait until `uri` is purged, failing after a second.
async fn purged(events: &mut broadcast::Receiver<StoreEvent>, uri: &str) {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match events.recv().await {
                Ok(StoreEvent::Purged { uri: purged }) if purged == uri => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("entry should be purged");
}

/// Deleting a chapter purges it and re-fetches the book that lists it.
#[tokio::test]
async fn test_delete_purges_and_reloads_referencing_entities() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/books/1",
        entity("/books/1", json!({ "chapters": [{ "href": "/chapters/5" }] })),
    )
    .await;
    mount_get(&server, "/chapters/5", entity("/chapters/5", json!({}))).await;
    mount_get(&server, "/authors/1", entity("/authors/1", json!({}))).await;
    Mock::given(method("DELETE"))
        .and(path("/chapters/5"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    load(&cache, "/books/1").await;
    load(&cache, "/chapters/5").await;
    load(&cache, "/authors/1").await;

    cache.delete("/chapters/5").await.unwrap();

    assert!(cache.is_unknown("/chapters/5"));
    assert_eq!(requests_to(&server, "GET", "/books/1").await, 2);
    // unrelated entities are left alone
    assert_eq!(requests_to(&server, "GET", "/authors/1").await, 1);
}

/// Mutually referencing entities do not reload each other forever.
#[tokio::test]
async fn test_delete_cascade_terminates_on_cycles() {
    let server = MockServer::start().await;
    mount_get(&server, "/a", entity("/a", json!({ "peer": { "href": "/b" } }))).await;
    mount_get(&server, "/b", entity("/b", json!({ "peer": { "href": "/a" } }))).await;
    Mock::given(method("DELETE"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    load(&cache, "/a").await;
    load(&cache, "/b").await;

    tokio::time::timeout(Duration::from_secs(2), cache.delete("/a"))
        .await
        .expect("delete should terminate")
        .unwrap();

    assert!(cache.is_unknown("/a"));
    assert!(!cache.is_unknown("/b"));
    assert_eq!(requests_to(&server, "GET", "/b").await, 2);
    assert_eq!(requests_to(&server, "GET", "/a").await, 1);
}

/// A referencer that turns out gone during the cascade is cleaned up in
/// turn, without bouncing back to the entity being deleted.
#[tokio::test]
async fn test_cascade_with_gone_referencer_terminates() {
    let server = MockServer::start().await;
    mount_get(&server, "/a", entity("/a", json!({ "peer": { "href": "/b" } }))).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(entity("/b", json!({ "peer": { "href": "/a" } }))),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    load(&cache, "/a").await;
    load(&cache, "/b").await;
    let mut events = cache.subscribe();

    cache.delete("/a").await.unwrap();
    purged(&mut events, "/b").await;

    assert!(cache.is_unknown("/a"));
    assert!(cache.is_unknown("/b"));
    assert_eq!(requests_to(&server, "GET", "/a").await, 1);
}

/// A failed delete clears the deleting flag and leaves the entry alone.
#[tokio::test]
async fn test_failed_delete_keeps_entry() {
    let server = MockServer::start().await;
    mount_get(&server, "/books/1", entity("/books/1", json!({}))).await;
    Mock::given(method("DELETE"))
        .and(path("/books/1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "detail": "locked" })))
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    load(&cache, "/books/1").await;

    let err = cache.delete("/books/1").await.unwrap_err();
    assert_eq!(err.response().unwrap().body["detail"], "locked");

    let snapshot = cache.snapshot("/books/1").expect("entry should remain");
    assert!(!snapshot.meta().deleting);
}

/// Deleting something the server no longer has still cleans up.
#[tokio::test]
async fn test_delete_of_already_gone_entity_succeeds() {
    let server = MockServer::start().await;
    mount_get(&server, "/books/1", entity("/books/1", json!({}))).await;
    Mock::given(method("DELETE"))
        .and(path("/books/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    load(&cache, "/books/1").await;

    cache.delete("/books/1").await.unwrap();
    assert!(cache.is_unknown("/books/1"));
}

/// A read that finds its entity gone purges it and refreshes referencers.
#[tokio::test]
async fn test_not_found_on_reload_self_heals() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/books/1",
        entity("/books/1", json!({ "chapters": [{ "href": "/chapters/5" }] })),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/chapters/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entity("/chapters/5", json!({}))))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chapters/5"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "title": "Not Found" })))
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    load(&cache, "/books/1").await;
    load(&cache, "/chapters/5").await;
    let mut events = cache.subscribe();

    let err = cache.reload("/chapters/5").await.unwrap_err();
    assert!(err.is_gone());
    assert!(err.to_string().contains("/chapters/5"));

    purged(&mut events, "/chapters/5").await;
    assert_eq!(requests_to(&server, "GET", "/books/1").await, 2);
}

/// Referencing embedded collections are refreshed through their owner.
#[tokio::test]
async fn test_delete_refreshes_embedded_collection_owner() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/books/1",
        json!({
            "_links": { "self": { "href": "/books/1" } },
            "_embedded": {
                "chapters": [
                    { "_links": { "self": { "href": "/chapters/5" } }, "title": "Intro" }
                ]
            }
        }),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/chapters/5"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let cache = cache_for(&server).await;
    load(&cache, "/books/1").await;
    assert!(!cache.is_unknown("/books/1#chapters"));

    cache.delete("/chapters/5").await.unwrap();

    assert!(cache.is_unknown("/chapters/5"));
    // the embedded list has no endpoint of its own
    assert_eq!(requests_to(&server, "GET", "/books/1").await, 2);
}
