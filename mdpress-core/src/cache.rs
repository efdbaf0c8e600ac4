//! Content-addressed compile cache.
//!
//! Entries are keyed by the hash of the raw document source, never by path:
//! an edit always produces new bytes and therefore a new key, so nothing is
//! invalidated explicitly. Least-recently-used eviction is the only removal
//! path.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of compiled pages kept
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Cache key derived from source bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey([u8; 32]);

impl SourceKey {
    pub fn of(source: &str) -> Self {
        Self(*blake3::hash(source.as_bytes()).as_bytes())
    }
}

/// Bounded recency cache from source text to a shared compiled value
#[derive(Debug)]
pub struct CompileCache<T> {
    entries: LruCache<SourceKey, Arc<T>>,
}

impl<T> CompileCache<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, source: &str) -> Option<Arc<T>> {
        self.entries.get(&SourceKey::of(source)).cloned()
    }

    pub fn set(&mut self, source: &str, value: Arc<T>) {
        self.entries.put(SourceKey::of(source), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for CompileCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_returns_same_allocation() {
        let mut cache = CompileCache::new(4);
        let value = Arc::new(String::from("compiled"));
        cache.set("# a", Arc::clone(&value));

        let hit = cache.get("# a").unwrap();
        assert!(Arc::ptr_eq(&hit, &value));
        assert!(cache.get("# a ").is_none());
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let mut cache = CompileCache::new(2);
        cache.set("a", Arc::new(1));
        cache.set("b", Arc::new(2));
        assert!(cache.get("a").is_some());
        cache.set("c", Arc::new(3));

        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_set_replaces_entry_for_same_source() {
        let mut cache = CompileCache::new(2);
        cache.set("a", Arc::new(1));
        cache.set("a", Arc::new(2));
        assert_eq!(*cache.get("a").unwrap(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_capacity_still_holds_one_entry() {
        let mut cache = CompileCache::new(0);
        cache.set("a", Arc::new(1));
        assert!(!cache.is_empty());
    }
}
