//! Timeout-bounded fetch over a ranked list of transports.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::request::{FetchRequest, FetchResponse};
use super::transport::{ReqwestTransport, Transport};
use crate::error::{FetchError, TransportError};

/// Default window for a single fetch attempt.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches with a timeout, falling through transports that report
/// themselves unusable.
///
/// Comes in two flavours. The `try_*` methods return the failure and are
/// meant for callers that record it, such as the circuit breaker. The plain
/// methods swallow it and return `None`.
#[derive(Clone)]
pub struct ResilientFetcher {
    transports: Vec<Arc<dyn Transport>>,
    default_timeout: Duration,
}

impl fmt::Debug for ResilientFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.transports.iter().map(|t| t.name()).collect();
        f.debug_struct("ResilientFetcher")
            .field("transports", &names)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl ResilientFetcher {
    /// Transports are tried in the order given.
    pub fn new(transports: Vec<Arc<dyn Transport>>, default_timeout: Duration) -> Self {
        Self {
            transports,
            default_timeout,
        }
    }

    /// Pooled client first, one-shot client as fallback.
    ///
    /// A client that fails to build is left out. Fails only when neither
    /// can be built.
    pub fn with_default_transports(default_timeout: Duration) -> Result<Self, TransportError> {
        let mut transports: Vec<Arc<dyn Transport>> = Vec::new();
        let mut last_error = None;

        for built in [ReqwestTransport::pooled(), ReqwestTransport::one_shot()] {
            match built {
                Ok(transport) => transports.push(Arc::new(transport)),
                Err(e) => {
                    warn!("Skipping transport: {}", e);
                    last_error = Some(e);
                }
            }
        }

        match (transports.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(Self::new(transports, default_timeout)),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Issues `request`, failing on timeout or transport error.
    ///
    /// Each transport gets the full `timeout`. Non-success statuses are
    /// returned as responses; callers decide what they mean.
    pub async fn try_fetch(
        &self,
        request: &FetchRequest,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchError> {
        let mut last_error = TransportError::Unusable("no transports configured".to_string());

        for transport in &self.transports {
            match tokio::time::timeout(timeout, transport.send(request)).await {
                Err(_) => {
                    debug!("Fetch of {} timed out after {:?}", request.url, timeout);
                    return Err(FetchError::Timeout {
                        url: request.url.clone(),
                        timeout,
                    });
                }
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(TransportError::Unusable(reason))) => {
                    warn!(
                        "Transport {} unusable for {}: {}, trying next",
                        transport.name(),
                        request.url,
                        reason
                    );
                    last_error = TransportError::Unusable(reason);
                }
                Ok(Err(TransportError::Rejected(reason))) => {
                    debug!("Request to {} rejected: {}", request.url, reason);
                    return Err(FetchError::InvalidRequest(reason));
                }
                Ok(Err(e)) => {
                    debug!("Fetch of {} failed via {}: {}", request.url, transport.name(), e);
                    return Err(e.into());
                }
            }
        }

        Err(last_error.into())
    }

    /// Like [`try_fetch`](Self::try_fetch), with failures mapped to `None`.
    pub async fn fetch(&self, request: &FetchRequest, timeout: Duration) -> Option<FetchResponse> {
        self.try_fetch(request, timeout).await.ok()
    }

    /// Fetches and decodes JSON. A non-success status is an error.
    pub async fn try_fetch_json<T: DeserializeOwned>(
        &self,
        request: &FetchRequest,
        timeout: Duration,
    ) -> Result<T, FetchError> {
        let response = self.try_fetch(request, timeout).await?;
        if !response.ok() {
            return Err(FetchError::Status {
                status: response.status,
                url: request.url.clone(),
            });
        }
        response.json().map_err(|e| FetchError::Parse {
            url: request.url.clone(),
            message: e.to_string(),
        })
    }

    /// Like [`try_fetch_json`](Self::try_fetch_json), with failures mapped to `None`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: &FetchRequest,
        timeout: Duration,
    ) -> Option<T> {
        match self.try_fetch_json(request, timeout).await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Silent fetch failed: {}", e);
                None
            }
        }
    }
}
