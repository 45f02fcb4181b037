//! hal-cache error types

use serde_json::Value;

/// A non-2xx response as received from the API.
///
/// Retained on server-side failures so callers can inspect the status and
/// the (usually problem+json) body.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    pub status: u16,
    pub body: Value,
}

/// Failure reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// A response arrived, but with a non-2xx status.
    #[error("HTTP status {status}")]
    Status { status: u16, body: Value },

    /// No response was received at all (DNS, connect, timeout, TLS...).
    #[error("network error: {0}")]
    Network(String),

    /// A 2xx response whose body could not be decoded.
    #[error("undecodable response body: {0}")]
    Decode(String),
}

/// hal-cache error types
///
/// `Clone` because one failed fetch is delivered to every caller waiting on
/// the same pending-load handle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HalCacheError {
    // Identification errors
    #[error("could not perform {operation}, \"{value}\" is not an entity or URI")]
    Unidentifiable {
        operation: &'static str,
        value: String,
    },

    // Transport errors
    #[error("network error: {0}")]
    Network(String),

    #[error("could not perform operation, \"{uri}\" has been deleted")]
    Gone { uri: String, response: ServerResponse },

    #[error("no permission to perform operation")]
    Forbidden { response: ServerResponse },

    #[error("server error ({})", response.status)]
    Server { response: ServerResponse },

    // Data errors
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The spawned load task was cancelled or panicked.
    #[error("load task failed: {0}")]
    Task(String),
}

impl HalCacheError {
    /// HTTP status of the response that caused this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HalCacheError::Gone { response, .. }
            | HalCacheError::Forbidden { response }
            | HalCacheError::Server { response } => Some(response.status),
            _ => None,
        }
    }

    /// The server response retained for inspection, if any.
    pub fn response(&self) -> Option<&ServerResponse> {
        match self {
            HalCacheError::Gone { response, .. }
            | HalCacheError::Forbidden { response }
            | HalCacheError::Server { response } => Some(response),
            _ => None,
        }
    }

    /// Whether the target resource no longer exists on the server.
    pub fn is_gone(&self) -> bool {
        matches!(self, HalCacheError::Gone { .. })
    }

    /// Whether repeating the same operation later might succeed.
    ///
    /// Network failures and 5xx responses are retryable; identification,
    /// permission and not-found failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            HalCacheError::Network(_) | HalCacheError::Task(_) => true,
            HalCacheError::Server { response } => response.status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for HalCacheError {
    fn from(err: serde_json::Error) -> Self {
        HalCacheError::Json(err.to_string())
    }
}

/// Turn a transport failure for `uri` into a caller-facing error.
///
/// Pure classification; the not-found cascade is triggered by the engine,
/// which decides whether to run it in the background or inline.
pub(crate) fn classify(uri: &str, err: TransportError) -> HalCacheError {
    match err {
        TransportError::Status { status, body } => {
            let response = ServerResponse { status, body };
            match status {
                404 | 410 => HalCacheError::Gone {
                    uri: uri.to_string(),
                    response,
                },
                403 => HalCacheError::Forbidden { response },
                _ => HalCacheError::Server { response },
            }
        }
        TransportError::Network(msg) => HalCacheError::Network(msg),
        TransportError::Decode(msg) => HalCacheError::InvalidResponse(msg),
    }
}

/// Result type alias for hal-cache operations
pub type Result<T> = std::result::Result<T, HalCacheError>;
