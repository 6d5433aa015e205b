//! Bounded per-path cache of syntax trees.
//!
//! Each entry keeps the adapter's opaque tree (if it exposes one) and the
//! fingerprint of the content it was parsed from. Size is capped at
//! `max_trees`; the least recently used path is evicted first.

use std::collections::{HashMap, VecDeque};

use regex::Regex;
use serde::Serialize;

use super::hash::ContentHash;

pub const DEFAULT_MAX_TREES: usize = 100;

#[derive(Debug)]
struct CacheEntry<T> {
    /// `None` when the adapter has no tree object or the tree was taken for
    /// an in-flight incremental parse.
    tree: Option<T>,
    content_hash: ContentHash,
}

/// Hit/miss/eviction counters plus current occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub max_trees: usize,
}

impl TreeCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
pub struct TreeCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    access_order: VecDeque<String>,
    max_trees: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<T> TreeCache<T> {
    /// A capacity of 0 is raised to 1.
    pub fn new(max_trees: usize) -> Self {
        let max_trees = max_trees.max(1);
        Self {
            entries: HashMap::with_capacity(max_trees.min(1024)),
            access_order: VecDeque::with_capacity(max_trees.min(1024)),
            max_trees,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Returns the cached tree for `path`. Counts as a hit only when a tree
    /// object is actually present.
    pub fn get(&mut self, path: &str) -> Option<&T> {
        let present = self
            .entries
            .get(path)
            .map(|e| e.tree.is_some())
            .unwrap_or(false);

        if present {
            self.hits += 1;
            self.touch(path);
        } else {
            self.misses += 1;
        }

        self.entries.get(path).and_then(|e| e.tree.as_ref())
    }

    /// Moves the tree out of the entry, leaving the entry and its hash in place.
    pub fn take_tree(&mut self, path: &str) -> Option<T> {
        let tree = self.entries.get_mut(path).and_then(|e| e.tree.take());
        if tree.is_some() {
            self.hits += 1;
            self.touch(path);
        } else {
            self.misses += 1;
        }
        tree
    }

    /// Inserts or overwrites the entry for `path`, evicting least recently
    /// used entries while the cache is over capacity.
    pub fn set(&mut self, path: &str, tree: Option<T>, content_hash: ContentHash) {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.tree = tree;
            entry.content_hash = content_hash;
            self.touch(path);
            return;
        }

        self.entries
            .insert(path.to_string(), CacheEntry { tree, content_hash });
        self.access_order.push_back(path.to_string());

        while self.entries.len() > self.max_trees {
            let Some(lru) = self.access_order.pop_front() else {
                break;
            };
            if self.entries.remove(&lru).is_some() {
                self.evictions += 1;
                tracing::debug!("Evicted syntax tree for {}", lru);
            }
        }
    }

    /// True iff an entry exists for `path` and it was parsed from content with
    /// exactly this fingerprint (same hash function version included).
    pub fn is_valid(&self, path: &str, content_hash: &ContentHash) -> bool {
        content_hash.is_current()
            && self
                .entries
                .get(path)
                .map(|e| e.content_hash == *content_hash)
                .unwrap_or(false)
    }

    pub fn has(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Records a use of `path` without reading its tree: a hit that refreshes
    /// recency, or a miss when nothing is cached.
    pub fn mark_used(&mut self, path: &str) -> bool {
        if self.entries.contains_key(path) {
            self.hits += 1;
            self.touch(path);
            true
        } else {
            self.misses += 1;
            false
        }
    }

    pub fn invalidate(&mut self, path: &str) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            self.access_order.retain(|p| p != path);
        }
        removed
    }

    pub fn invalidate_many<S: AsRef<str>>(&mut self, paths: &[S]) -> usize {
        paths
            .iter()
            .filter(|p| self.invalidate(p.as_ref()))
            .count()
    }

    /// Removes every entry whose path matches `pattern`; returns how many.
    pub fn invalidate_pattern(&mut self, pattern: &Regex) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| !pattern.is_match(path));
        self.access_order.retain(|path| !pattern.is_match(path));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_order.clear();
    }

    /// Drops every held tree. Tree-sitter trees release their native
    /// allocation on drop, so this is all the cleanup they need.
    pub fn dispose(&mut self) {
        self.clear();
        self.entries.shrink_to_fit();
        self.access_order.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_trees(&self) -> usize {
        self.max_trees
    }

    pub fn stats(&self) -> TreeCacheStats {
        TreeCacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size: self.entries.len(),
            max_trees: self.max_trees,
        }
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    fn touch(&mut self, path: &str) {
        if self.access_order.back().map(|p| p == path).unwrap_or(false) {
            return;
        }
        self.access_order.retain(|p| p != path);
        self.access_order.push_back(path.to_string());
    }
}

impl<T> Default for TreeCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TREES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(s: &str) -> ContentHash {
        ContentHash::of(s)
    }

    #[test]
    fn test_set_and_get() {
        let mut cache: TreeCache<u32> = TreeCache::new(4);
        cache.set("a.ts", Some(1), hash("a"));

        assert_eq!(cache.get("a.ts"), Some(&1));
        assert_eq!(cache.get("b.ts"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_set_overwrites_in_place() {
        let mut cache: TreeCache<u32> = TreeCache::new(4);
        cache.set("a.ts", Some(1), hash("a"));
        cache.set("a.ts", Some(2), hash("b"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a.ts"), Some(&2));
        assert!(cache.is_valid("a.ts", &hash("b")));
        assert!(!cache.is_valid("a.ts", &hash("a")));
    }

    #[test]
    fn test_is_valid_requires_entry_and_matching_hash() {
        let mut cache: TreeCache<u32> = TreeCache::new(4);
        assert!(!cache.is_valid("a.ts", &hash("a")));

        cache.set("a.ts", None, hash("a"));
        assert!(cache.is_valid("a.ts", &hash("a")));
        assert!(cache.has("a.ts"));
        // placeholder entries are valid but hold no tree
        assert_eq!(cache.get("a.ts"), None);
    }

    #[test]
    fn test_is_valid_rejects_other_hash_version() {
        let mut cache: TreeCache<u32> = TreeCache::new(4);
        let current = hash("a");
        cache.set("a.ts", Some(1), current);

        let foreign = ContentHash {
            version: current.version.wrapping_add(1),
            value: current.value,
        };
        assert!(!cache.is_valid("a.ts", &foreign));
    }

    #[test]
    fn test_never_exceeds_max_trees() {
        let mut cache: TreeCache<usize> = TreeCache::new(3);
        for i in 0..50 {
            cache.set(&format!("file_{}.rs", i % 7), Some(i), hash(&i.to_string()));
            assert!(cache.len() <= 3);
        }
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn test_zero_capacity_raised_to_one() {
        let mut cache: TreeCache<u8> = TreeCache::new(0);
        assert_eq!(cache.max_trees(), 1);

        cache.set("a", Some(1), hash("a"));
        assert!(cache.is_valid("a", &hash("a")));
        cache.set("b", Some(2), hash("b"));
        assert_eq!(cache.len(), 1);
        assert!(cache.has("b"));
    }

    #[test]
    fn test_mark_used_refreshes_recency() {
        let mut cache: TreeCache<u32> = TreeCache::new(2);
        cache.set("a", None, hash("a"));
        cache.set("b", Some(2), hash("b"));

        assert!(cache.mark_used("a"));
        assert!(!cache.mark_used("missing"));
        cache.set("c", Some(3), hash("c"));

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache: TreeCache<u32> = TreeCache::new(2);
        cache.set("a", Some(1), hash("a"));
        cache.set("b", Some(2), hash("b"));

        // touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.set("c", Some(3), hash("c"));

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_take_tree_keeps_entry() {
        let mut cache: TreeCache<String> = TreeCache::new(2);
        cache.set("a", Some("tree".to_string()), hash("a"));

        assert_eq!(cache.take_tree("a").as_deref(), Some("tree"));
        assert!(cache.has("a"));
        assert!(cache.take_tree("a").is_none());
        assert!(cache.is_valid("a", &hash("a")));
    }

    #[test]
    fn test_invalidate_variants() {
        let mut cache: TreeCache<u32> = TreeCache::new(10);
        for name in ["src/a.ts", "src/b.ts", "lib/c.rs", "lib/d.rs", "e.py"] {
            cache.set(name, Some(0), hash(name));
        }

        assert!(cache.invalidate("e.py"));
        assert!(!cache.invalidate("e.py"));

        assert_eq!(cache.invalidate_many(&["src/a.ts", "missing.ts"]), 1);

        let pattern = Regex::new(r"^lib/.*\.rs$").unwrap();
        assert_eq!(cache.invalidate_pattern(&pattern), 2);

        assert_eq!(cache.len(), 1);
        assert!(cache.has("src/b.ts"));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reset_stats_and_dispose() {
        let mut cache: TreeCache<u32> = TreeCache::new(1);
        cache.set("a", Some(1), hash("a"));
        cache.set("b", Some(2), hash("b"));
        let _ = cache.get("a");
        let _ = cache.get("b");

        cache.reset_stats();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.evictions), (0, 0, 0));
        assert_eq!(stats.size, 1);

        cache.dispose();
        assert!(cache.is_empty());
        assert!((cache.stats().hit_rate() - 0.0).abs() < f64::EPSILON);
    }
}
