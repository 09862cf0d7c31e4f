//! TTL + LRU cache for completed search results.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::types::{SearchResult, SearchStrategy};

/// Derive the cache key for a query. Context domains and filter entries are
/// sorted first, so logically equal requests hash identically regardless of
/// argument order.
pub fn cache_key(
    query: &str,
    strategy: SearchStrategy,
    context_domains: Option<&[String]>,
    filters: Option<&serde_json::Value>,
) -> String {
    let mut domains: Vec<&str> = context_domains
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .collect();
    domains.sort_unstable();

    let mut filter_items: Vec<String> = match filters {
        Some(serde_json::Value::Object(map)) => {
            map.iter().map(|(k, v)| format!("{k}:{v}")).collect()
        }
        _ => Vec::new(),
    };
    filter_items.sort_unstable();

    let material = format!(
        "{query}|{strategy}|{}|{}",
        domains.join(","),
        filter_items.join(",")
    );
    hex::encode(Sha256::digest(material.as_bytes()))
}

struct CacheEntry {
    result: SearchResult,
    inserted_at: Instant,
}

/// Bounded in-process cache with per-entry TTL and LRU eviction. Entries past
/// their TTL are dropped lazily on lookup.
pub struct SearchCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    max_entries: usize,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Keys from least to most recently used.
    order: Vec<String>,
}

impl SearchCache {
    pub const DEFAULT_MAX_ENTRIES: usize = 1000;

    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<SearchResult> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            debug!(key, "cache entry expired");
            return None;
        }
        Self::touch(&mut inner, key);
        inner.entries.get(key).map(|entry| entry.result.clone())
    }

    pub fn put(&self, key: String, result: SearchResult) {
        let mut inner = self.inner.lock();
        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            if let Some(oldest) = inner.order.first().cloned() {
                inner.entries.remove(&oldest);
                inner.order.remove(0);
                debug!(key = oldest, "evicted least recently used entry");
            }
        }
        inner.entries.insert(
            key.clone(),
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
        Self::touch(&mut inner, &key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    fn touch(inner: &mut CacheInner, key: &str) {
        inner.order.retain(|k| k != key);
        inner.order.push(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(query: &str) -> SearchResult {
        SearchResult {
            query: query.into(),
            strategy: SearchStrategy::Balanced,
            results: Vec::new(),
            sources: HashMap::new(),
            metadata: serde_json::Map::new(),
            execution_time: Duration::from_millis(5),
            confidence_score: 0.0,
        }
    }

    #[test]
    fn key_ignores_domain_and_filter_order() {
        let a = cache_key(
            "q",
            SearchStrategy::Balanced,
            Some(&["ops".into(), "dev".into()]),
            Some(&json!({"b": 1, "a": 2})),
        );
        let b = cache_key(
            "q",
            SearchStrategy::Balanced,
            Some(&["dev".into(), "ops".into()]),
            Some(&json!({"a": 2, "b": 1})),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn key_varies_with_strategy() {
        let a = cache_key("q", SearchStrategy::Balanced, None, None);
        let b = cache_key("q", SearchStrategy::GraphFirst, None, None);
        assert_ne!(a, b);
    }

    #[test]
    fn get_returns_stored_result() {
        let cache = SearchCache::new(Duration::from_secs(60), 10);
        cache.put("k".into(), result("hello"));
        let hit = cache.get("k").unwrap();
        assert_eq!(hit.query, "hello");
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = SearchCache::new(Duration::ZERO, 10);
        cache.put("k".into(), result("hello"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let cache = SearchCache::new(Duration::from_secs(60), 2);
        cache.put("a".into(), result("a"));
        cache.put("b".into(), result("b"));
        // Touch "a" so "b" becomes the eviction candidate.
        cache.get("a");
        cache.put("c".into(), result("c"));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }
}
