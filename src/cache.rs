// src/cache.rs

//! Cross-node analysis cache.
//!
//! Some derived results (edge positions, symbol boundaries) are needed by
//! several nodes in the same run. Nodes can memoize them in a shared
//! [`AnalysisCache`]. The executor clears the cache at the start of every
//! run so nothing computed from last run's waveforms leaks into this one.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

pub trait AnalysisCache: Send + Sync {
    fn clear(&self);
}

/// Cache that holds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnalysisCache;

impl AnalysisCache for NoAnalysisCache {
    fn clear(&self) {}
}

type Entry = Arc<dyn Any + Send + Sync>;

/// String-keyed memo table shared between nodes.
#[derive(Default)]
pub struct MemoCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value stored under `key`, computing and storing it first if
    /// it is missing or was stored with a different type.
    ///
    /// `compute` runs without the cache lock held, so two nodes racing on the
    /// same key may both compute it; the first insert wins.
    pub fn get_or_insert_with<T, F>(&self, key: &str, compute: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get::<T>(key) {
            return hit;
        }

        let value: Arc<T> = Arc::new(compute());
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = entries.get(key).and_then(|e| Arc::clone(e).downcast::<T>().ok()) {
            return existing;
        }

        entries.insert(key.to_string(), value.clone() as Entry);
        value
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .and_then(|e| Arc::clone(e).downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalysisCache for MemoCache {
    fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.is_empty() {
            debug!(entries = entries.len(), "clearing analysis cache");
        }
        entries.clear();
    }
}

impl std::fmt::Debug for MemoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once_per_key() {
        let cache = MemoCache::new();
        let mut calls = 0;

        let a = cache.get_or_insert_with("edges:ch1", || {
            calls += 1;
            vec![10u64, 20, 30]
        });
        let b = cache.get_or_insert_with("edges:ch1", || {
            calls += 1;
            vec![0u64]
        });

        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn type_mismatch_replaces_entry() {
        let cache = MemoCache::new();
        cache.get_or_insert_with("k", || 1u32);

        let s = cache.get_or_insert_with("k", || "text".to_string());

        assert_eq!(s.as_str(), "text");
        assert!(cache.get::<u32>("k").is_none());
    }

    #[test]
    fn clear_empties_the_table() {
        let cache = MemoCache::new();
        cache.get_or_insert_with("a", || 1u8);
        cache.get_or_insert_with("b", || 2u8);

        AnalysisCache::clear(&cache);

        assert!(cache.is_empty());
    }
}
