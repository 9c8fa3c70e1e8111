//! The bounded page buffer of an open tree.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use lru::LruCache;
use parking_lot::Mutex;
use sift_common::Result;

use super::Page;

/// Bounded cache of decoded pages, evicted least-recently-used.
///
/// Pages are immutable and handed out as `Arc`, so a page evicted while a reader
/// still holds it stays valid for that reader. The lock only guards the LRU
/// bookkeeping; page loads happen outside of it. Two threads missing on the same
/// page may both load it, and the second insert simply refreshes the entry.
pub struct PageBuffer {
    pages: Mutex<LruCache<u32, Arc<Page>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Snapshot of the page buffer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Maximum number of pages held (`n_blocks`).
    pub capacity: usize,
    /// Pages held right now.
    pub resident: usize,
    /// Page requests answered without a disk read.
    pub hits: u64,
    /// Page requests that read the page from disk.
    pub misses: u64,
}

impl PageBuffer {
    pub fn new(capacity: NonZeroUsize) -> PageBuffer {
        PageBuffer {
            pages: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached page, or decodes it with `load` and caches it, evicting
    /// the least recently used page when full.
    pub fn get_or_load(&self, page_id: u32, load: impl FnOnce() -> Result<Page>) -> Result<Arc<Page>> {
        if let Some(page) = self.pages.lock().get(&page_id).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(page);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let page = Arc::new(load()?);
        self.pages.lock().put(page_id, page.clone());
        Ok(page)
    }

    pub fn stats(&self) -> BufferStats {
        let pages = self.pages.lock();
        BufferStats {
            capacity: pages.cap().get(),
            resident: pages.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.pages.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::LeafPage;

    fn empty_leaf() -> Result<Page> {
        Ok(Page::Leaf(LeafPage {
            entries: vec![],
            next_leaf: None,
        }))
    }

    #[test]
    fn test_lru_eviction() {
        let buffer = PageBuffer::new(NonZeroUsize::new(2).unwrap());
        buffer.get_or_load(1, empty_leaf).unwrap();
        buffer.get_or_load(2, empty_leaf).unwrap();
        buffer.get_or_load(1, empty_leaf).unwrap();
        // Page 2 is the least recently used and goes first.
        buffer.get_or_load(3, empty_leaf).unwrap();
        buffer.get_or_load(1, empty_leaf).unwrap();
        buffer.get_or_load(2, empty_leaf).unwrap();

        let stats = buffer.stats();
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.resident, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 4);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let buffer = PageBuffer::new(NonZeroUsize::new(4).unwrap());
        let failed = buffer.get_or_load(7, || {
            Err(sift_common::error::Error::checksum_mismatch("page 7"))
        });
        assert!(failed.is_err());
        assert_eq!(buffer.stats().resident, 0);
        assert!(buffer.get_or_load(7, empty_leaf).is_ok());
    }

    #[test]
    fn test_concurrent_access() {
        let buffer = Arc::new(PageBuffer::new(NonZeroUsize::new(3).unwrap()));
        std::thread::scope(|scope| {
            for t in 0..4u32 {
                let buffer = buffer.clone();
                scope.spawn(move || {
                    for i in 0..200u32 {
                        buffer.get_or_load((i + t) % 8, empty_leaf).unwrap();
                    }
                });
            }
        });
        let stats = buffer.stats();
        assert_eq!(stats.hits + stats.misses, 800);
        assert!(stats.resident <= 3);
    }
}
