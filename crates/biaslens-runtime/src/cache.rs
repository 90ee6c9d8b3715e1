//! Bounded FIFO cache of pipeline results.
//!
//! Keys are a SHA-256 digest of `(prompt, response, model)`. Entries are
//! shared as `Arc<PipelineResult>` and never mutated after insertion. When
//! the cache is full the oldest insertion is evicted.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use biaslens_core::ModelHint;

use crate::pipeline::PipelineResult;

/// Digest of the inputs that identify a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn new(prompt: &str, response: &str, model: &ModelHint) -> Self {
        let mut hasher = Sha256::new();
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart
        for field in [prompt, response, model.as_str()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Hex form, for logging.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, Arc<PipelineResult>>,
    order: VecDeque<CacheKey>,
}

/// Thread-safe bounded result cache. Capacity zero disables caching.
pub struct ResultCache {
    capacity: usize,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Entries are immutable once inserted, so a poisoned map is still consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a result, counting the hit or miss.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<PipelineResult>> {
        if self.capacity == 0 {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let found = self.lock().entries.get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Insert a result unless another caller already did, and return the
    /// cached instance.
    pub fn get_or_insert(&self, key: CacheKey, result: Arc<PipelineResult>) -> Arc<PipelineResult> {
        if self.capacity == 0 {
            return result;
        }
        let mut inner = self.lock();
        if let Some(existing) = inner.entries.get(&key) {
            return Arc::clone(existing);
        }
        while inner.order.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.order.push_back(key);
        inner.entries.insert(key, Arc::clone(&result));
        result
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use chrono::{TimeZone, Utc};

    fn result(response: &str) -> Arc<PipelineResult> {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let pipeline = Pipeline::with_defaults();
        Arc::new(pipeline.run_uncached("What do Sikhs believe?", response, &ModelHint::Unknown, at))
    }

    fn key(response: &str) -> CacheKey {
        CacheKey::new("What do Sikhs believe?", response, &ModelHint::Unknown)
    }

    #[test]
    fn test_key_separates_fields() {
        let m = ModelHint::Unknown;
        assert_ne!(CacheKey::new("ab", "c", &m), CacheKey::new("a", "bc", &m));
        assert_ne!(
            CacheKey::new("p", "r", &m),
            CacheKey::new("p", "r", &ModelHint::new(Some("gpt-4")))
        );
        assert_eq!(CacheKey::new("p", "r", &m), CacheKey::new("p", "r", &m));
        assert_eq!(CacheKey::new("p", "r", &m).to_hex().len(), 64);
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = ResultCache::new(2);
        for response in ["one", "two", "three"] {
            cache.get_or_insert(key(response), result(response));
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("one")).is_none());
        assert!(cache.get(&key("two")).is_some());
        assert!(cache.get(&key("three")).is_some());
    }

    #[test]
    fn test_get_or_insert_keeps_first_instance() {
        let cache = ResultCache::new(4);
        let first = cache.get_or_insert(key("one"), result("one"));
        let second = cache.get_or_insert(key("one"), result("one"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats_and_clear() {
        let cache = ResultCache::new(4);
        assert!(cache.get(&key("one")).is_none());
        cache.get_or_insert(key("one"), result("one"));
        assert!(cache.get(&key("one")).is_some());

        assert_eq!(
            cache.stats(),
            CacheStats { size: 1, capacity: 4, hits: 1, misses: 1 }
        );

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = ResultCache::new(0);
        cache.get_or_insert(key("one"), result("one"));

        assert!(cache.is_empty());
        assert!(cache.get(&key("one")).is_none());
    }
}
