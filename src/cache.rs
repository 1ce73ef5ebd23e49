//! LRU memo cache and streaming statistics.
//!
//! The cache backs the shared elevation patches and the traced river sets:
//! both are pure functions of the seed, so an evicted entry is simply
//! recomputed on the next request.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::hash::Hash;

/// Streaming statistics for monitoring
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered by an already resident chunk
    pub hits: u64,
    /// Requests that had to load or generate
    pub misses: u64,
    /// Chunks produced by the generation pipeline
    pub generated: u64,
    /// Chunks restored from disk
    pub disk_loads: u64,
    /// Chunks written to disk
    pub disk_saves: u64,
    /// Chunks dropped from memory
    pub evictions: u64,
    /// Persisted chunks rejected as corrupt and regenerated
    pub discarded: u64,
    /// Chunks currently resident
    pub resident: usize,
}

impl CacheStats {
    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }

    /// Format as human-readable string
    pub fn summary(&self) -> String {
        format!(
            "Hits: {} | Misses: {} | Rate: {:.1}% | Generated: {} | Disk: {}/{} | Evicted: {} | Discarded: {} | Resident: {}",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.generated,
            self.disk_loads,
            self.disk_saves,
            self.evictions,
            self.discarded,
            self.resident,
        )
    }
}

/// Bounded least-recently-used map.
pub struct LruCache<K, V> {
    entries: HashMap<K, V>,
    /// LRU order (most recent at back)
    lru_order: VecDeque<K>,
    max_size: usize,
}

impl<K: Copy + Eq + Hash, V> LruCache<K, V> {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: HashMap::with_capacity(max_size),
            lru_order: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.entries.contains_key(key) {
            self.touch(*key);
            self.entries.get(key)
        } else {
            None
        }
    }

    /// Insert a value, returning the key evicted to make room, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        let mut evicted = None;

        if self.entries.len() >= self.max_size && !self.entries.contains_key(&key) {
            if let Some(old_key) = self.lru_order.pop_front() {
                self.entries.remove(&old_key);
                evicted = Some(old_key);
            }
        }

        self.touch(key);
        self.entries.insert(key, value);

        evicted
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: K) {
        self.lru_order.retain(|k| *k != key);
        self.lru_order.push_back(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recent() {
        let mut cache = LruCache::new(2);
        assert_eq!(cache.insert(1, "a"), None);
        assert_eq!(cache.insert(2, "b"), None);

        // Touch 1 so 2 becomes the oldest
        assert_eq!(cache.get(&1), Some(&"a"));
        assert_eq!(cache.insert(3, "c"), Some(2));

        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let mut cache = LruCache::new(2);
        cache.insert(1, 10);
        cache.insert(2, 20);
        assert_eq!(cache.insert(2, 21), None);
        assert_eq!(cache.get(&2), Some(&21));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&1));
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < 1e-6);
        assert!(stats.summary().contains("75.0%"));
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
