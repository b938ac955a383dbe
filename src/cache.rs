use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory read cache for record values, keyed by the raw key bytes.
///
/// The cache is not authoritative; the files on disk are. It is also not
/// internally synchronized: map access happens under the database lock. The
/// hit/miss counters are atomic so stats can be read without holding it.
pub struct Cache {
    inner: Inner,
    stats: Stats,
}

enum Inner {
    /// Grows without bound.
    Unbounded(HashMap<Vec<u8>, Vec<u8>>),
    /// Pass-through that stores nothing.
    Disabled,
    /// Bounded; inserting at capacity evicts one arbitrary resident entry.
    Random {
        entries: HashMap<Vec<u8>, Vec<u8>>,
        max_size: usize,
    },
}

impl Cache {
    /// Creates a cache for the given maximum size. Negative is unbounded,
    /// zero disables caching, positive bounds the cache at that many entries.
    pub fn new(max_size: i64) -> Self {
        let inner = match max_size {
            n if n < 0 => Inner::Unbounded(HashMap::new()),
            0 => Inner::Disabled,
            n => Inner::Random {
                entries: HashMap::new(),
                max_size: n as usize,
            },
        };
        Cache {
            inner,
            stats: Stats::new(),
        }
    }

    /// Returns a copy of the cached value for the key, recording a hit or a
    /// miss either way.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let value = match &self.inner {
            Inner::Unbounded(entries) => entries.get(key),
            Inner::Disabled => None,
            Inner::Random { entries, .. } => entries.get(key),
        };
        match value {
            Some(v) => {
                self.stats.hit();
                Some(v.clone())
            }
            None => {
                self.stats.miss();
                None
            }
        }
    }

    /// Inserts or overwrites an entry.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        match &mut self.inner {
            Inner::Unbounded(entries) => {
                entries.insert(key, value);
            }
            Inner::Disabled => {}
            Inner::Random { entries, max_size } => {
                if !entries.contains_key(&key) && entries.len() >= *max_size {
                    // Overwrites keep their slot; only a fresh key evicts.
                    if let Some(evicted) = entries.keys().next().cloned() {
                        entries.remove(&evicted);
                    }
                }
                entries.insert(key, value);
            }
        }
    }

    /// Removes an entry, if present.
    pub fn delete(&mut self, key: &[u8]) {
        match &mut self.inner {
            Inner::Unbounded(entries) => {
                entries.remove(key);
            }
            Inner::Disabled => {}
            Inner::Random { entries, .. } => {
                entries.remove(key);
            }
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Unbounded(entries) => entries.len(),
            Inner::Disabled => 0,
            Inner::Random { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups that found a cached value.
    pub fn hits(&self) -> u64 {
        self.stats.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that fell through to disk.
    pub fn misses(&self) -> u64 {
        self.stats.misses.load(Ordering::Relaxed)
    }

    /// Resets the hit/miss counters.
    pub fn reset_stats(&self) {
        self.stats.hits.store(0, Ordering::Relaxed);
        self.stats.misses.store(0, Ordering::Relaxed);
    }
}

struct Stats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Stats {
    fn new() -> Self {
        Stats {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn test_unbounded_grows_freely() {
        let mut cache = Cache::new(-1);
        for i in 0..1000u32 {
            cache.put(i.to_be_bytes().to_vec(), entry("v"));
        }
        assert_eq!(cache.len(), 1000);
        assert_eq!(cache.get(&0u32.to_be_bytes()), Some(entry("v")));
    }

    #[test]
    fn test_disabled_stores_nothing() {
        let mut cache = Cache::new(0);
        cache.put(entry("k"), entry("v"));
        assert_eq!(cache.get(b"k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_random_eviction_respects_capacity() {
        let mut cache = Cache::new(2);
        cache.put(entry("a"), entry("1"));
        cache.put(entry("b"), entry("2"));
        cache.put(entry("c"), entry("3"));

        assert_eq!(cache.len(), 2);
        // The newest entry always survives the insert that evicted.
        assert_eq!(cache.get(b"c"), Some(entry("3")));
    }

    #[test]
    fn test_random_overwrite_at_capacity_evicts_nothing() {
        let mut cache = Cache::new(2);
        cache.put(entry("a"), entry("1"));
        cache.put(entry("b"), entry("2"));
        cache.put(entry("a"), entry("updated"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(b"a"), Some(entry("updated")));
        assert_eq!(cache.get(b"b"), Some(entry("2")));
    }

    #[test]
    fn test_delete() {
        let mut cache = Cache::new(-1);
        cache.put(entry("a"), entry("1"));
        cache.delete(b"a");
        assert_eq!(cache.get(b"a"), None);

        // Deleting an absent key is a no-op.
        cache.delete(b"missing");
    }

    #[test]
    fn test_hit_miss_counters() {
        let mut cache = Cache::new(-1);
        cache.put(entry("a"), entry("1"));

        assert!(cache.get(b"a").is_some());
        assert!(cache.get(b"a").is_some());
        assert!(cache.get(b"nope").is_none());

        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);

        cache.reset_stats();
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 0);
    }

    #[test]
    fn test_disabled_still_counts_misses() {
        let mut cache = Cache::new(0);
        cache.put(entry("a"), entry("1"));
        assert!(cache.get(b"a").is_none());
        assert_eq!(cache.misses(), 1);
    }
}
