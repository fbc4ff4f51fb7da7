//! Read-through cache for the unfiltered product listing.

use std::sync::atomic::{AtomicU64, Ordering};

use furnish_types::catalog::{PageRequest, ProductPage, Sort};
use moka::sync::Cache;

/// Page number plus the shape of the page, so requests with a different size
/// or ordering never share an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub page: PageRequest,
    pub sort: Sort,
}

/// Entries are tagged by generation: `invalidate_all` bumps it, and a page
/// read under an older generation is dropped instead of cached.
pub struct PageCache {
    inner: Cache<PageKey, ProductPage>,
    generation: AtomicU64,
}

impl PageCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::new(capacity),
            generation: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &PageKey) -> Option<ProductPage> {
        self.inner.get(key)
    }

    /// Capture before reading the page from the store.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Caches `page` unless an invalidation happened since `generation` was
    /// taken. The insert comes first so an invalidation landing in between
    /// is caught by the re-check.
    pub fn put(&self, key: PageKey, page: ProductPage, generation: u64) {
        self.inner.insert(key, page);
        if self.generation() != generation {
            self.inner.invalidate(&key);
        }
    }

    pub fn invalidate(&self, key: &PageKey) {
        self.inner.invalidate(key);
    }

    /// Drops every cached page. Called after any product write.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_all();
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(256)
    }
}
