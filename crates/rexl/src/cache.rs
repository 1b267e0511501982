//! Bounded source→program cache.
//!
//! Keys are the raw source text (prefixed by the parameter list when the
//! program declares parameters). Eviction is least-recently-used. Parse
//! failures never populate the cache; concurrent compilations of the same
//! source race benignly, the last finished parse wins the slot.

use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use lru::LruCache;
use parking_lot::Mutex;

use crate::program::ScriptBody;

pub(crate) struct ProgramCache {
    inner: Option<Mutex<LruCache<String, Arc<ScriptBody>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("enabled", &self.inner.is_some())
            .finish_non_exhaustive()
    }
}

impl ProgramCache {
    /// Capacity zero disables caching entirely.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<ScriptBody>> {
        let inner = self.inner.as_ref()?;
        let found = inner.lock().get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn put(&self, key: String, body: Arc<ScriptBody>) {
        if let Some(inner) = &self.inner {
            inner.lock().put(key, body);
        }
    }

    /// (hits, misses) counters, for cache behavior assertions.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;

    fn body(source: &str) -> Arc<ScriptBody> {
        Arc::new(parse_script(source, &[]).unwrap())
    }

    #[test]
    fn lru_evicts_the_oldest_entry() {
        let cache = ProgramCache::new(2);
        cache.put("a".into(), body("1"));
        cache.put("b".into(), body("2"));
        cache.put("c".into(), body("3"));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = ProgramCache::new(0);
        cache.put("a".into(), body("1"));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats(), (0, 0));
    }

    #[test]
    fn hit_and_miss_counters() {
        let cache = ProgramCache::new(4);
        assert!(cache.get("a").is_none());
        cache.put("a".into(), body("1"));
        assert!(cache.get("a").is_some());
        assert_eq!(cache.stats(), (1, 1));
    }
}
