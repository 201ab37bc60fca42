//! Configuration Module
//!
//! Loads proxy configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::DEFAULT_QUOTA_BYTES;

const DEFAULT_IMAGE_HOSTS: &[&str] = &["images.unsplash.com", "res.cloudinary.com"];
const DEFAULT_PRELOAD_SECTIONS: &[&str] = &[
    "hero",
    "faq",
    "testimonials",
    "about",
    "showroom",
    "footer",
    "seo",
    "pixels",
];

/// Proxy configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the landing-page origin
    pub origin_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// JSON file backing the TTL cache, memory-only when unset
    pub cache_file: Option<PathBuf>,
    /// Byte budget of the durable cache blob
    pub cache_quota_bytes: usize,
    /// TTL in seconds for cached content payloads
    pub default_ttl: u64,
    /// Per-attempt fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
    pub health_path: String,
    pub diagnostic_path: String,
    /// Health poll interval in seconds
    pub health_poll_interval: u64,
    /// Breaker sweep interval in seconds
    pub breaker_sweep_interval: u64,
    /// TTL cleanup interval in seconds
    pub cleanup_interval: u64,
    /// Suffix of the worker cache names
    pub cache_version: String,
    /// Cross-origin hosts whose images are cached
    pub image_hosts: Vec<String>,
    /// Sections warmed at startup
    pub preload_sections: Vec<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ORIGIN_URL` - Origin base URL (default: http://127.0.0.1:5000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_FILE` - Durable cache file (default: unset, memory only)
    /// - `CACHE_QUOTA_BYTES` - Durable cache budget (default: 5242880)
    /// - `DEFAULT_TTL` - Content TTL in seconds (default: 300)
    /// - `FETCH_TIMEOUT_MS` - Fetch timeout (default: 10000)
    /// - `HEALTH_PATH` / `DIAGNOSTIC_PATH` - Probe paths (default: /api/health, /api/test)
    /// - `HEALTH_POLL_INTERVAL` - Seconds between health polls (default: 15)
    /// - `BREAKER_SWEEP_INTERVAL` - Seconds between breaker sweeps (default: 30)
    /// - `CLEANUP_INTERVAL` - Seconds between TTL cleanups (default: 60)
    /// - `CACHE_VERSION` - Worker cache version (default: v1)
    /// - `IMAGE_HOSTS` - Comma-separated image hosts
    /// - `PRELOAD_SECTIONS` - Comma-separated sections to preload
    ///
    /// Unparsable values use the default. So does zero for the timeout and
    /// the three intervals.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            origin_url: env::var("ORIGIN_URL").unwrap_or(defaults.origin_url),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cache_file: env::var("CACHE_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            cache_quota_bytes: parse_var("CACHE_QUOTA_BYTES").unwrap_or(defaults.cache_quota_bytes),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            fetch_timeout_ms: parse_positive("FETCH_TIMEOUT_MS")
                .unwrap_or(defaults.fetch_timeout_ms),
            health_path: env::var("HEALTH_PATH").unwrap_or(defaults.health_path),
            diagnostic_path: env::var("DIAGNOSTIC_PATH").unwrap_or(defaults.diagnostic_path),
            health_poll_interval: parse_positive("HEALTH_POLL_INTERVAL")
                .unwrap_or(defaults.health_poll_interval),
            breaker_sweep_interval: parse_positive("BREAKER_SWEEP_INTERVAL")
                .unwrap_or(defaults.breaker_sweep_interval),
            cleanup_interval: parse_positive("CLEANUP_INTERVAL")
                .unwrap_or(defaults.cleanup_interval),
            cache_version: env::var("CACHE_VERSION").unwrap_or(defaults.cache_version),
            image_hosts: env::var("IMAGE_HOSTS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.image_hosts),
            preload_sections: env::var("PRELOAD_SECTIONS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.preload_sections),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin_url: "http://127.0.0.1:5000".to_string(),
            server_port: 3000,
            cache_file: None,
            cache_quota_bytes: DEFAULT_QUOTA_BYTES,
            default_ttl: 300,
            fetch_timeout_ms: 10_000,
            health_path: "/api/health".to_string(),
            diagnostic_path: "/api/test".to_string(),
            health_poll_interval: 15,
            breaker_sweep_interval: 30,
            cleanup_interval: 60,
            cache_version: "v1".to_string(),
            image_hosts: DEFAULT_IMAGE_HOSTS.iter().map(|s| s.to_string()).collect(),
            preload_sections: DEFAULT_PRELOAD_SECTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Intervals and timeouts of zero fall back to the default.
fn parse_positive(key: &str) -> Option<u64> {
    parse_var::<u64>(key).filter(|v| *v > 0)
}

/// Splits a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
