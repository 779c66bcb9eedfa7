//! In-memory tier with byte-budget LRU eviction.
//!
//! Entries are keyed by `(location, key)` and weighted by their byte length.
//! Inserting past the budget evicts least-recently-used entries until the new
//! entry fits. Eviction is deterministic so tests can reason about it.

use bytes::Bytes;
use lru::LruCache;
use tierkit_core::{CacheKey, StorageLocation};

type MemoryKey = (StorageLocation, CacheKey);

/// Statistics about memory tier usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Number of memory hits.
    pub hits: u64,
    /// Number of memory misses.
    pub misses: u64,
    /// Number of entries currently held.
    pub entry_count: u64,
    /// Total byte cost currently held.
    pub memory_bytes: u64,
    /// Number of entries evicted to stay within budget.
    pub evictions: u64,
    /// Number of inserts larger than the whole budget, never retained.
    pub rejected: u64,
}

impl MemoryStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Byte-budgeted LRU map from `(location, key)` to payload bytes.
#[derive(Debug)]
pub struct MemoryTier {
    entries: LruCache<MemoryKey, Bytes>,
    cost_limit: usize,
    total_cost: usize,
    stats: MemoryStats,
}

impl MemoryTier {
    /// Create a memory tier holding at most `cost_limit` bytes.
    pub fn new(cost_limit: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            cost_limit,
            total_cost: 0,
            stats: MemoryStats::default(),
        }
    }

    /// Look up an entry, marking it most recently used.
    pub fn get(&mut self, location: StorageLocation, key: &str) -> Option<Bytes> {
        match self.entries.get(&(location, key.to_string())) {
            Some(data) => {
                self.stats.hits += 1;
                Some(data.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert an entry, replacing any previous value for the same key.
    ///
    /// Returns the number of entries evicted to make room. A value larger
    /// than the whole budget is not retained.
    pub fn insert(&mut self, location: StorageLocation, key: &str, data: Bytes) -> usize {
        let memory_key = (location, key.to_string());
        if let Some(previous) = self.entries.pop(&memory_key) {
            self.total_cost -= previous.len();
        }

        let cost = data.len();
        if cost > self.cost_limit {
            self.stats.rejected += 1;
            self.sync_sizes();
            return 0;
        }

        let mut evicted = 0;
        while self.total_cost + cost > self.cost_limit {
            match self.entries.pop_lru() {
                Some((_, old)) => {
                    self.total_cost -= old.len();
                    evicted += 1;
                }
                None => break,
            }
        }

        self.entries.put(memory_key, data);
        self.total_cost += cost;
        self.stats.evictions += evicted as u64;
        self.sync_sizes();
        evicted
    }

    /// Remove an entry, returning its bytes if present.
    pub fn remove(&mut self, location: StorageLocation, key: &str) -> Option<Bytes> {
        let removed = self.entries.pop(&(location, key.to_string()));
        if let Some(data) = &removed {
            self.total_cost -= data.len();
            self.sync_sizes();
        }
        removed
    }

    /// Drop every entry. Statistics counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_cost = 0;
        self.sync_sizes();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current total byte cost.
    pub fn total_cost(&self) -> usize {
        self.total_cost
    }

    pub fn cost_limit(&self) -> usize {
        self.cost_limit
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats.clone()
    }

    fn sync_sizes(&mut self) {
        self.stats.entry_count = self.entries.len() as u64;
        self.stats.memory_bytes = self.total_cost as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: StorageLocation = StorageLocation::Transient;
    const P: StorageLocation = StorageLocation::Persistent;

    fn bytes_of(len: usize) -> Bytes {
        Bytes::from(vec![7u8; len])
    }

    #[test]
    fn test_read_after_write() {
        let mut tier = MemoryTier::new(1024);
        tier.insert(T, "a", Bytes::from_static(b"hello"));
        assert_eq!(tier.get(T, "a"), Some(Bytes::from_static(b"hello")));
        assert_eq!(tier.total_cost(), 5);
    }

    #[test]
    fn test_locations_are_separate() {
        let mut tier = MemoryTier::new(1024);
        tier.insert(T, "k", Bytes::from_static(b"cache"));
        tier.insert(P, "k", Bytes::from_static(b"document"));
        assert_eq!(tier.get(T, "k"), Some(Bytes::from_static(b"cache")));
        assert_eq!(tier.get(P, "k"), Some(Bytes::from_static(b"document")));
    }

    #[test]
    fn test_replace_adjusts_cost() {
        let mut tier = MemoryTier::new(1024);
        tier.insert(T, "k", bytes_of(100));
        tier.insert(T, "k", bytes_of(40));
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.total_cost(), 40);
    }

    #[test]
    fn test_evicts_least_recently_used_first() {
        let mut tier = MemoryTier::new(30);
        tier.insert(T, "a", bytes_of(10));
        tier.insert(T, "b", bytes_of(10));
        tier.insert(T, "c", bytes_of(10));

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(tier.get(T, "a").is_some());

        let evicted = tier.insert(T, "d", bytes_of(10));
        assert_eq!(evicted, 1);
        assert!(tier.get(T, "b").is_none());
        assert!(tier.get(T, "a").is_some());
        assert!(tier.get(T, "c").is_some());
        assert!(tier.get(T, "d").is_some());
        assert_eq!(tier.total_cost(), 30);
    }

    #[test]
    fn test_evicts_until_cost_fits() {
        let mut tier = MemoryTier::new(30);
        tier.insert(T, "a", bytes_of(10));
        tier.insert(T, "b", bytes_of(10));
        tier.insert(T, "c", bytes_of(10));

        let evicted = tier.insert(T, "big", bytes_of(25));
        assert_eq!(evicted, 3);
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.stats().evictions, 3);
    }

    #[test]
    fn test_oversized_value_not_retained() {
        let mut tier = MemoryTier::new(8);
        tier.insert(T, "small", bytes_of(4));
        tier.insert(T, "huge", bytes_of(9));
        assert!(tier.get(T, "huge").is_none());
        assert!(tier.get(T, "small").is_some());
        assert_eq!(tier.stats().rejected, 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut tier = MemoryTier::new(100);
        tier.insert(T, "a", bytes_of(10));
        tier.insert(P, "b", bytes_of(20));

        assert_eq!(tier.remove(T, "a").map(|b| b.len()), Some(10));
        assert!(tier.remove(T, "a").is_none());
        assert_eq!(tier.total_cost(), 20);

        tier.clear();
        assert!(tier.is_empty());
        assert_eq!(tier.total_cost(), 0);
    }

    #[test]
    fn test_stats_hit_rate() {
        let mut tier = MemoryTier::new(100);
        tier.insert(T, "a", bytes_of(1));
        tier.get(T, "a");
        tier.get(T, "a");
        tier.get(T, "a");
        tier.get(T, "missing");

        let stats = tier.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.75).abs() < 0.001);
        assert!((MemoryStats::default().hit_rate() - 0.0).abs() < 0.001);
    }
}
