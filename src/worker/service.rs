//! Offline cache worker.
//!
//! Intercepts requests for images, API payloads and static assets and
//! applies a per-class strategy: cache-first for images and static assets,
//! network-first with cached fallback for the API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::classify::{Classifier, ResourceClass};
use super::storage::CacheStorage;
use crate::error::WorkerError;
use crate::fetch::{FetchRequest, FetchResponse, ResilientFetcher};

// == Worker Config ==
/// Cache version and per-class capacity.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Suffix of every cache name; bumping it drops old caches on activation.
    pub version: String,
    pub image_limit: usize,
    pub api_limit: usize,
    pub static_limit: usize,
    pub fetch_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            image_limit: 100,
            api_limit: 50,
            static_limit: 200,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    /// Versioned cache name for `class`.
    pub fn cache_name(&self, class: ResourceClass) -> String {
        format!("reseller-{}-{}", class.slug(), self.version)
    }

    pub fn limit(&self, class: ResourceClass) -> usize {
        match class {
            ResourceClass::Image => self.image_limit,
            ResourceClass::Api => self.api_limit,
            ResourceClass::Static => self.static_limit,
        }
    }
}

/// Entry count of one named cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSize {
    pub name: String,
    pub entries: usize,
}

// == Cache Worker ==
/// Caching layer between clients and the origin. Clones share storage.
#[derive(Debug, Clone)]
pub struct CacheWorker {
    config: Arc<WorkerConfig>,
    classifier: Arc<Classifier>,
    fetcher: ResilientFetcher,
    storage: Arc<RwLock<CacheStorage>>,
    active: Arc<AtomicBool>,
}

impl CacheWorker {
    pub fn new(config: WorkerConfig, classifier: Classifier, fetcher: ResilientFetcher) -> Self {
        Self {
            config: Arc::new(config),
            classifier: Arc::new(classifier),
            fetcher,
            storage: Arc::new(RwLock::new(CacheStorage::new())),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<RwLock<CacheStorage>> {
        &self.storage
    }

    /// Whether the worker has activated and intercepts requests.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    // == Lifecycle ==
    /// Creates the current caches, then activates without waiting.
    pub async fn install(&self) -> usize {
        {
            let mut storage = self.storage.write().await;
            for class in ResourceClass::ALL {
                storage.open(&self.config.cache_name(class));
            }
        }
        info!("Cache worker {} installed", self.config.version);
        self.activate().await
    }

    /// Deletes caches from other versions and starts intercepting.
    ///
    /// Returns how many caches were deleted.
    pub async fn activate(&self) -> usize {
        let current: HashSet<String> = ResourceClass::ALL
            .iter()
            .map(|class| self.config.cache_name(*class))
            .collect();

        let deleted = {
            let mut storage = self.storage.write().await;
            let stale: Vec<String> = storage
                .keys()
                .into_iter()
                .filter(|name| !current.contains(name))
                .collect();
            for name in &stale {
                info!("Deleting old cache {}", name);
                storage.delete(name);
            }
            stale.len()
        };

        self.active.store(true, Ordering::SeqCst);
        info!("Cache worker {} active", self.config.version);
        deleted
    }

    // == Request Handling ==
    /// Answers `request` using the strategy for its class.
    ///
    /// Unclassified requests, and every request before activation, go
    /// straight to the network.
    pub async fn handle(&self, request: FetchRequest) -> Result<FetchResponse, WorkerError> {
        let class = if self.is_active() {
            Url::parse(&request.url)
                .ok()
                .and_then(|url| self.classifier.classify(&request.method, &url))
        } else {
            None
        };

        match class {
            Some(ResourceClass::Api) => self.network_first(ResourceClass::Api, &request).await,
            Some(class) => Ok(self.cache_first(class, &request).await),
            None => Ok(self
                .fetcher
                .try_fetch(&request, self.config.fetch_timeout)
                .await?),
        }
    }

    /// Serves from cache, falling back to the network and caching OK replies.
    ///
    /// Never fails: with neither a cached copy nor a reachable origin the
    /// answer is a synthetic 404.
    pub async fn cache_first(&self, class: ResourceClass, request: &FetchRequest) -> FetchResponse {
        let name = self.config.cache_name(class);

        if let Some(cached) = self.lookup(&name, &request.url).await {
            debug!("Serving {} from {}", request.url, name);
            return cached;
        }

        match self.fetcher.try_fetch(request, self.config.fetch_timeout).await {
            Ok(response) => {
                if response.ok() {
                    self.store(class, &request.url, response.clone()).await;
                }
                response
            }
            Err(e) => {
                debug!("{} unavailable and not cached: {}", request.url, e);
                FetchResponse::not_found()
            }
        }
    }

    /// Tries the network first, caching OK replies, and falls back to the
    /// last cached reply when the network fails.
    pub async fn network_first(
        &self,
        class: ResourceClass,
        request: &FetchRequest,
    ) -> Result<FetchResponse, WorkerError> {
        let name = self.config.cache_name(class);

        match self.fetcher.try_fetch(request, self.config.fetch_timeout).await {
            Ok(response) => {
                if response.ok() {
                    self.store(class, &request.url, response.clone()).await;
                }
                Ok(response)
            }
            Err(e) => match self.lookup(&name, &request.url).await {
                Some(cached) => {
                    warn!("Network failed for {}, serving cached copy: {}", request.url, e);
                    Ok(cached)
                }
                None => Err(WorkerError::Upstream(e)),
            },
        }
    }

    /// Entry counts of every cache, sorted by name.
    pub async fn cache_sizes(&self) -> Vec<CacheSize> {
        let storage = self.storage.read().await;
        storage
            .keys()
            .into_iter()
            .map(|name| {
                let entries = storage.get(&name).map(|c| c.len()).unwrap_or(0);
                CacheSize { name, entries }
            })
            .collect()
    }

    async fn lookup(&self, cache_name: &str, url: &str) -> Option<FetchResponse> {
        let storage = self.storage.read().await;
        storage.get(cache_name)?.match_url(url).cloned()
    }

    async fn store(&self, class: ResourceClass, url: &str, response: FetchResponse) {
        let name = self.config.cache_name(class);
        let limit = self.config.limit(class);

        let mut storage = self.storage.write().await;
        let cache = storage.open(&name);
        cache.put(url, response);
        let trimmed = cache.trim(limit);
        if trimmed > 0 {
            debug!("Trimmed {} entries from {}", trimmed, name);
        }
    }
}
