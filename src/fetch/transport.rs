//! HTTP transports.
//!
//! A transport issues one request and buffers the response. The fetcher
//! ranks several of them and falls through to the next when one fails in a
//! way specific to how it manages connections.

use async_trait::async_trait;
use reqwest::Client;

use super::request::{FetchRequest, FetchResponse};
use crate::error::TransportError;

const USER_AGENT: &str = concat!("reseller-shield/", env!("CARGO_PKG_VERSION"));

/// Something that can carry a [`FetchRequest`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Issues the request and buffers the full response.
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// Transport backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    name: String,
    client: Client,
    reuses_connections: bool,
}

impl ReqwestTransport {
    /// Keep-alive client with connection pooling. The primary transport.
    pub fn pooled() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Unusable(format!("Failed to build pooled client: {}", e)))?;
        Ok(Self::from_client("pooled", client))
    }

    /// HTTP/1 client that never reuses connections.
    ///
    /// Shares nothing with the pooled client, so a poisoned pool or a broken
    /// HTTP/2 session does not affect it.
    pub fn one_shot() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .http1_only()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| {
                TransportError::Unusable(format!("Failed to build one-shot client: {}", e))
            })?;
        Ok(Self::from_client("one-shot", client).fresh_connections())
    }

    /// Wraps an existing client. Assumed to pool connections.
    pub fn from_client(name: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            client,
            reuses_connections: true,
        }
    }

    /// Marks the client as opening a new connection per request.
    pub fn fresh_connections(mut self) -> Self {
        self.reuses_connections = false;
        self
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_builder() {
            return TransportError::Rejected(err.to_string());
        }
        // Connected, then lost the exchange. On a pooled client that is
        // usually a keep-alive connection the peer already closed.
        if self.reuses_connections && err.is_request() && !err.is_connect() && !err.is_timeout() {
            return TransportError::Unusable(err.to_string());
        }
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }
}
