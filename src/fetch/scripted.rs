//! In-process transport with scripted replies, for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::request::{FetchRequest, FetchResponse};
use super::transport::Transport;
use crate::error::TransportError;

/// Replies per URL and counts calls. Unknown URLs fail on the network.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    name: String,
    routes: Mutex<HashMap<String, Result<FetchResponse, TransportError>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Every reply waits this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the reply for `url`, replacing any previous one.
    pub fn respond(&self, url: &str, reply: Result<FetchResponse, TransportError>) {
        self.routes.lock().unwrap().insert(url.to_string(), reply);
    }

    pub fn respond_json(&self, url: &str, value: serde_json::Value) {
        self.respond(url, Ok(FetchResponse::json_body(200, &value)));
    }

    pub fn fail(&self, url: &str) {
        self.respond(
            url,
            Err(TransportError::Network("connection refused".into())),
        );
    }

    /// Calls made for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        self.calls.lock().unwrap().push(request.url.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.routes
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::Network(format!("no route to {}", request.url))))
    }
}
