//! Response caching
//!
//! Retrieval is stateless and idempotent against an unchanged snapshot, so
//! responses can be cached by request key. The whole cache is dropped when
//! a new snapshot is installed.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::requests::RetrieveResponse;

/// LRU cache for retrieval responses.
pub struct ResponseCache {
    retrievals: Mutex<LruCache<String, RetrieveResponse>>,
}

impl ResponseCache {
    /// Create a new cache with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(100).unwrap());
        Self {
            retrievals: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get a cached retrieval response.
    pub fn get_retrieval(&self, key: &str) -> Option<RetrieveResponse> {
        self.retrievals.lock().ok()?.get(key).cloned()
    }

    /// Store a retrieval response.
    pub fn set_retrieval(&self, key: String, response: RetrieveResponse) {
        if let Ok(mut guard) = self.retrievals.lock() {
            guard.put(key, response);
        }
    }

    /// Drop everything; called on snapshot install.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.retrievals.lock() {
            guard.clear();
        }
    }

    /// Number of cached responses.
    pub fn len(&self) -> usize {
        self.retrievals.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> RetrieveResponse {
        RetrieveResponse {
            results: vec![],
            degraded: false,
            warnings: vec![],
            severity: None,
            cached: false,
            query_time_ms: 1,
        }
    }

    #[test]
    fn test_set_and_get() {
        let cache = ResponseCache::new(10);
        cache.set_retrieval("k1".to_string(), response());

        assert!(cache.get_retrieval("k1").is_some());
        assert!(cache.get_retrieval("k2").is_none());
    }

    #[test]
    fn test_clear() {
        let cache = ResponseCache::new(10);
        cache.set_retrieval("k1".to_string(), response());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = ResponseCache::new(2);
        cache.set_retrieval("a".to_string(), response());
        cache.set_retrieval("b".to_string(), response());
        cache.set_retrieval("c".to_string(), response());

        assert_eq!(cache.len(), 2);
        assert!(cache.get_retrieval("a").is_none());
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let cache = ResponseCache::new(0);
        cache.set_retrieval("a".to_string(), response());
        assert!(cache.get_retrieval("a").is_some());
    }
}
