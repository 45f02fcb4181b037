//! HTTP transport boundary.
//!
//! The cache talks to the API only through [`Transport`]; tests substitute
//! an in-memory implementation, production uses [`HttpTransport`].

mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

pub use http::HttpTransport;

/// Outcome of one transport call: the response body on 2xx.
pub type TransportResult = std::result::Result<Value, TransportError>;

/// Minimal HTTP surface required by the cache.
///
/// `url` is always absolute (the configured API root followed by the
/// canonical URI). A 2xx response with an empty body yields `Value::Null`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> TransportResult;

    async fn post(&self, url: &str, body: &Value) -> TransportResult;

    async fn patch(&self, url: &str, body: &Value) -> TransportResult;

    async fn delete(&self, url: &str) -> TransportResult;
}
