//! Named response caches.

use std::collections::HashMap;

use super::order::InsertionOrder;
use crate::fetch::FetchResponse;

// == Named Cache ==
/// Request URL to response map that remembers write order.
#[derive(Debug, Default, Clone)]
pub struct NamedCache {
    entries: HashMap<String, FetchResponse>,
    order: InsertionOrder,
}

impl NamedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `response` for `url`, replacing any previous one.
    pub fn put(&mut self, url: &str, response: FetchResponse) {
        self.entries.insert(url.to_string(), response);
        self.order.record(url);
    }

    /// Cached response for `url`.
    pub fn match_url(&self, url: &str) -> Option<&FetchResponse> {
        self.entries.get(url)
    }

    pub fn delete(&mut self, url: &str) -> bool {
        self.order.remove(url);
        self.entries.remove(url).is_some()
    }

    /// URLs from oldest to newest write.
    pub fn keys(&self) -> Vec<String> {
        self.order.iter().map(str::to_string).collect()
    }

    /// Deletes oldest entries until at most `max` remain. Returns how many went.
    pub fn trim(&mut self, max: usize) -> usize {
        let mut removed = 0;
        while self.entries.len() > max {
            match self.order.pop_oldest() {
                Some(url) => {
                    self.entries.remove(&url);
                    removed += 1;
                }
                None => break,
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Cache Storage ==
/// All named caches owned by the worker.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, NamedCache>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `name`, creating it empty if needed.
    pub fn open(&mut self, name: &str) -> &mut NamedCache {
        self.caches.entry(name.to_string()).or_default()
    }

    pub fn get(&self, name: &str) -> Option<&NamedCache> {
        self.caches.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// Cache names, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> FetchResponse {
        FetchResponse::new(200, body.to_string())
    }

    #[test]
    fn test_put_and_match() {
        let mut cache = NamedCache::new();
        cache.put("http://origin/app.js", response("js"));

        assert_eq!(cache.match_url("http://origin/app.js").unwrap().text(), "js");
        assert!(cache.match_url("http://origin/app.css").is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let mut cache = NamedCache::new();
        cache.put("http://origin/api/hero", response("old"));
        cache.put("http://origin/api/hero", response("new"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.match_url("http://origin/api/hero").unwrap().text(), "new");
    }

    #[test]
    fn test_trim_removes_oldest() {
        let mut cache = NamedCache::new();
        for i in 0..5 {
            cache.put(&format!("http://origin/{}.png", i), response("img"));
        }

        assert_eq!(cache.trim(3), 2);
        assert_eq!(
            cache.keys(),
            vec![
                "http://origin/2.png",
                "http://origin/3.png",
                "http://origin/4.png"
            ]
        );
        assert_eq!(cache.trim(3), 0);
    }

    #[test]
    fn test_delete() {
        let mut cache = NamedCache::new();
        cache.put("a", response("a"));

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert!(cache.is_empty());
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn test_storage_open_and_delete() {
        let mut storage = CacheStorage::new();
        storage.open("reseller-images-v1").put("a", response("a"));
        storage.open("reseller-api-v1");

        assert_eq!(storage.keys(), vec!["reseller-api-v1", "reseller-images-v1"]);
        assert_eq!(storage.get("reseller-images-v1").unwrap().len(), 1);

        assert!(storage.delete("reseller-api-v1"));
        assert!(!storage.has("reseller-api-v1"));
    }
}
