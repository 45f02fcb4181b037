//! reqwest-backed [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use tracing::debug;

use super::{Transport, TransportResult};
use crate::error::TransportError;
use crate::{HalCacheError, Result};

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const HAL_JSON: &str = "application/hal+json, application/json";

/// HTTP client speaking HAL+JSON.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HalCacheError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Wrap an already configured reqwest client (custom headers, proxies).
    pub fn from_client(http: Client) -> Self {
        Self { http }
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> TransportResult {
        debug!(%method, url, "sending request");
        let mut request = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, HAL_JSON);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        handle_response(response).await
    }
}

async fn handle_response(response: Response) -> TransportResult {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;

    // error bodies are kept even when they are not JSON
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) if !status.is_success() => Value::String(text),
            Err(e) => return Err(TransportError::Decode(e.to_string())),
        }
    };

    if status.is_success() {
        Ok(body)
    } else {
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> TransportResult {
        self.send(Method::GET, url, None).await
    }

    async fn post(&self, url: &str, body: &Value) -> TransportResult {
        self.send(Method::POST, url, Some(body)).await
    }

    async fn patch(&self, url: &str, body: &Value) -> TransportResult {
        self.send(Method::PATCH, url, Some(body)).await
    }

    async fn delete(&self, url: &str) -> TransportResult {
        self.send(Method::DELETE, url, None).await
    }
}
