//! In-memory LRU image cache with a byte budget.

use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, ImageBlob};

/// Default memory budget for decoded images (64 MB).
pub const DEFAULT_MEMORY_BUDGET: usize = 64 * 1024 * 1024;

struct Inner {
    entries: LruCache<CacheKey, ImageBlob>,
    total_bytes: usize,
}

/// In-memory LRU cache for decoded images, bounded by total byte footprint
/// rather than entry count.
///
/// Probes are synchronous so they can run inline on the caller's task
/// without a suspension point. Thread-safe.
pub struct MemoryImageCache {
    inner: Mutex<Inner>,
    budget_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryImageCache {
    /// Creates a new cache with the given byte budget.
    #[must_use]
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                total_bytes: 0,
            }),
            budget_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a cache with the default budget.
    #[must_use]
    pub fn with_default_budget() -> Self {
        Self::new(DEFAULT_MEMORY_BUDGET)
    }

    /// Gets a blob, promoting it to most-recently-used.
    pub fn get(&self, key: &CacheKey) -> Option<ImageBlob> {
        let mut inner = self.inner.lock();
        if let Some(blob) = inner.entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(blob.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    /// Peeks at a blob without promoting it in the LRU.
    pub fn peek(&self, key: &CacheKey) -> Option<ImageBlob> {
        let inner = self.inner.lock();
        inner.entries.peek(key).cloned()
    }

    /// Inserts a blob, evicting least-recently-used entries until the total
    /// footprint fits the budget again.
    ///
    /// A blob larger than the entire budget is never inserted; the cache
    /// would have to empty itself for a single entry and still not fit it.
    pub fn put(&self, key: CacheKey, blob: ImageBlob) {
        let size = blob.size_bytes();
        if size > self.budget_bytes {
            debug!(key = %key, size = size, budget = self.budget_bytes,
                "Blob exceeds memory budget, skipping insert");
            return;
        }

        let mut inner = self.inner.lock();
        if let Some(old) = inner.entries.put(key, blob) {
            inner.total_bytes -= old.size_bytes();
        }
        inner.total_bytes += size;

        while inner.total_bytes > self.budget_bytes {
            let Some((evicted_key, evicted)) = inner.entries.pop_lru() else {
                break;
            };
            inner.total_bytes -= evicted.size_bytes();
            debug!(key = %evicted_key, size = evicted.size_bytes(), "Evicted from memory cache");
        }
    }

    /// Returns true if a key is cached, without updating recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains(key)
    }

    /// Current number of cached images.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current total footprint of cached images in bytes.
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// The configured byte budget.
    #[must_use]
    pub const fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.total_bytes = 0;
        debug!("Cleared memory image cache");
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
            total_bytes: self.total_bytes(),
        }
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::with_default_budget()
    }
}

impl std::fmt::Debug for MemoryImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageCache")
            .field("budget_bytes", &self.budget_bytes)
            .finish_non_exhaustive()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Current total footprint in bytes.
    pub total_bytes: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images, {} bytes, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.total_bytes, self.hit_rate, self.hits, self.misses
        )
    }
}
