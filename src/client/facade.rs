use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::breaker::CircuitBreaker;
use crate::cache::TtlCache;
use crate::error::FetchError;
use crate::fetch::{FetchRequest, ResilientFetcher};

/// Shared TTL cache of decoded JSON payloads.
pub type SharedJsonCache = Arc<RwLock<TtlCache<Value>>>;

// == Preload Target ==
/// One endpoint to warm at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadTarget {
    pub url: String,
    pub cache_key: Option<String>,
    pub ttl: Duration,
}

impl PreloadTarget {
    pub fn new(url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            url: url.into(),
            cache_key: None,
            ttl,
        }
    }

    /// `/api/<section>` under `origin` for every section.
    pub fn sections(origin: &str, sections: &[String], ttl: Duration) -> Vec<Self> {
        let base = origin.trim_end_matches('/');
        sections
            .iter()
            .map(|section| Self::new(format!("{}/api/{}", base, section), ttl))
            .collect()
    }
}

// == Cached Fetcher ==
/// TTL cache in front of a breaker-guarded resilient fetch.
///
/// Lookups answer from the cache when they can. Misses go through the
/// circuit for the request URL and only successful, well-formed payloads are
/// cached. Every failure reads as `None`.
#[derive(Debug, Clone)]
pub struct CachedFetcher {
    cache: SharedJsonCache,
    breaker: CircuitBreaker,
    fetcher: ResilientFetcher,
}

impl CachedFetcher {
    pub fn new(cache: SharedJsonCache, breaker: CircuitBreaker, fetcher: ResilientFetcher) -> Self {
        Self {
            cache,
            breaker,
            fetcher,
        }
    }

    pub fn cache(&self) -> &SharedJsonCache {
        &self.cache
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Fetches JSON through the cache.
    ///
    /// `cache_key` defaults to the request URL. Concurrent misses for the
    /// same key each hit the network.
    pub async fn cached_fetch_json<T: DeserializeOwned>(
        &self,
        request: FetchRequest,
        cache_key: Option<&str>,
        ttl: Duration,
    ) -> Option<T> {
        let key = cache_key.unwrap_or(&request.url).to_string();

        let cached = self.cache.write().await.get(&key);
        if let Some(value) = cached {
            match serde_json::from_value(value) {
                Ok(typed) => {
                    debug!("Cache hit for {}", key);
                    return Some(typed);
                }
                Err(e) => debug!("Cached value for {} has the wrong shape: {}", key, e),
            }
        }
        debug!("Cache miss for {}", key);

        let timeout = self.fetcher.default_timeout();
        let outcome = self
            .breaker
            .execute(&request.url, || async {
                let value: Value = self.fetcher.try_fetch_json(&request, timeout).await?;
                let typed = serde_json::from_value::<T>(value.clone()).map_err(|e| {
                    FetchError::Parse {
                        url: request.url.clone(),
                        message: e.to_string(),
                    }
                })?;
                Ok::<_, FetchError>((value, typed))
            })
            .await;

        match outcome {
            Ok(Some((value, typed))) => {
                self.cache.write().await.set(key, value, ttl);
                Some(typed)
            }
            Ok(None) => {
                debug!("Circuit open for {}, returning nothing", request.url);
                None
            }
            Err(e) => {
                debug!("Fetch for {} failed: {}", key, e);
                None
            }
        }
    }

    /// GET `url` as JSON through the cache, keyed by URL.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, ttl: Duration) -> Option<T> {
        self.cached_fetch_json(FetchRequest::get(url), None, ttl).await
    }

    /// Warms the cache for every target concurrently.
    ///
    /// Returns how many targets were cached. Failures are dropped.
    pub async fn preload(&self, targets: &[PreloadTarget]) -> usize {
        let loads = targets.iter().map(|target| {
            self.cached_fetch_json::<Value>(
                FetchRequest::get(&target.url),
                target.cache_key.as_deref(),
                target.ttl,
            )
        });

        let warmed = join_all(loads)
            .await
            .into_iter()
            .filter(Option::is_some)
            .count();
        info!("Preloaded {}/{} endpoints", warmed, targets.len());
        warmed
    }

    /// Drops one cached payload.
    pub async fn invalidate(&self, cache_key: &str) -> bool {
        self.cache.write().await.delete(cache_key)
    }
}
