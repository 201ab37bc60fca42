//! Error types for the resilience layer
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Transport Error ==
/// Failure reported by a single transport implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport failed in a way a different transport may not, such
    /// as a stale pooled connection. The next ranked transport is tried.
    #[error("Transport unusable: {0}")]
    Unusable(String),

    /// The request itself is malformed. No transport can send it.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The request was issued and failed on the network.
    #[error("Network error: {0}")]
    Network(String),
}

// == Fetch Error ==
/// Failure of a resilient fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No response within the configured window
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// Every transport failed, or the last one failed on the network
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response arrived with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The body was not valid JSON for the requested type
    #[error("Invalid JSON from {url}: {message}")]
    Parse { url: String, message: String },

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == Store Error ==
/// Failure of the durable cache store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Blob could not be encoded or decoded
    #[error("Storage blob is invalid: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The blob does not fit in the storage budget
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
}

// == Worker Error ==
/// Failure surfaced by the offline cache worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Network failed and nothing was cached for the request
    #[error("Upstream unavailable: {0}")]
    Upstream(#[from] FetchError),
}

// == Shield Error ==
/// HTTP-facing error type for the proxy and diagnostics endpoints.
#[derive(Error, Debug)]
pub enum ShieldError {
    /// The origin could not be reached and no cached copy exists
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Content is temporarily unavailable (open circuit, timeout, bad payload)
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<WorkerError> for ShieldError {
    fn from(err: WorkerError) -> Self {
        ShieldError::BadGateway(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ShieldError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShieldError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ShieldError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ShieldError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ShieldError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the HTTP surface.
pub type Result<T> = std::result::Result<T, ShieldError>;
