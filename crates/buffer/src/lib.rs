//! Buffer cache for page-level I/O.
//!
//! The cache sits in front of the pager and maintains a bounded resident
//! set with LRU ordering. Reads are served from memory when possible; on
//! pressure the least-recently-used page is evicted, written back first if
//! dirty. The cache does not detect writes — callers mutate a page through
//! [`BufferPool::get`] and then call [`BufferPool::mark_dirty`].
//!
//! A reference returned by `get` is valid only until the next cache call;
//! any later call may evict the page behind it.
//!
//! # Example
//!
//! ```no_run
//! use buffer::BufferPool;
//! use storage::Pager;
//! use std::path::Path;
//!
//! let pager = Pager::open(Path::new("/tmp/db")).unwrap();
//! let mut pool = BufferPool::new(pager, 100);
//!
//! let pid = pool.allocate_new().unwrap();
//! {
//!     let page = pool.get(pid).unwrap();
//!     page.data[0] = 42;
//! }
//! pool.mark_dirty(pid);
//! pool.flush_all().unwrap();
//! ```


use common::{DbError, DbResult, PageId};
use hashbrown::HashSet;
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use storage::{Page, Pager};

/// Resident-set bound used outside of tests.
pub const DEFAULT_CACHE_PAGES: usize = 100;

/// Bounded page cache with LRU eviction and dirty write-back.
#[derive(Debug)]
pub struct BufferPool {
    pager: Pager,
    max_pages: usize,
    cache: LruCache<PageId, Page>,
    dirty: HashSet<PageId>,
}

impl BufferPool {
    /// Wrap a pager with a cache holding at most `max_pages` pages.
    ///
    /// # Panics
    ///
    /// Panics if `max_pages` is 0.
    pub fn new(pager: Pager, max_pages: usize) -> Self {
        assert!(max_pages > 0, "max_pages must be > 0");
        Self {
            pager,
            max_pages,
            cache: LruCache::new(NonZeroUsize::new(max_pages).unwrap()),
            dirty: HashSet::new(),
        }
    }

    /// Fetch a page, loading it from disk on a miss.
    ///
    /// A hit promotes the page to the head of the LRU order. The returned
    /// reference is invalidated by the next cache call.
    pub fn get(&mut self, pid: PageId) -> DbResult<&mut Page> {
        if self.cache.contains(&pid) {
            // LruCache::get_mut updates LRU order
            return Ok(self.cache.get_mut(&pid).unwrap());
        }

        let page = self.pager.read_page(pid)?;
        self.evict_if_needed()?;
        self.cache.push(pid, page);
        Ok(self.cache.get_mut(&pid).unwrap())
    }

    /// Allocate a fresh page and install it, zeroed and dirty, at the head.
    pub fn allocate_new(&mut self) -> DbResult<PageId> {
        let pid = self.pager.allocate_page()?;
        self.evict_if_needed()?;
        self.cache.push(pid, Page::new(pid));
        self.dirty.insert(pid);
        Ok(pid)
    }

    /// Record that the caller mutated the page's bytes.
    pub fn mark_dirty(&mut self, pid: PageId) {
        self.dirty.insert(pid);
    }

    /// Write every dirty resident page and clear its flag.
    pub fn flush_all(&mut self) -> DbResult<()> {
        let dirty: Vec<PageId> = self.dirty.iter().copied().collect();
        for pid in dirty {
            if let Some(page) = self.cache.peek(&pid) {
                self.pager.write_page(page)?;
                self.dirty.remove(&pid);
            }
        }
        Ok(())
    }

    /// Flush all dirty pages, then the header, and release the file.
    pub fn close(mut self) -> DbResult<()> {
        self.flush_all()?;
        self.pager.close()
    }

    /// Evict the LRU tail if the cache is at capacity.
    ///
    /// A dirty victim is written back before removal; if that write fails
    /// the victim stays resident (and dirty) at the tail and the error
    /// surfaces as [`DbError::WriteBackFailed`].
    fn evict_if_needed(&mut self) -> DbResult<()> {
        if self.cache.len() < self.max_pages {
            return Ok(());
        }

        let victim = match self.cache.peek_lru() {
            Some((&pid, _)) => pid,
            None => return Ok(()),
        };
        if self.dirty.contains(&victim) {
            let page = self.cache.peek(&victim).unwrap();
            self.pager
                .write_page(page)
                .map_err(|e| DbError::WriteBackFailed(e.to_string()))?;
            self.dirty.remove(&victim);
        }
        debug!("evicting page {}", victim.0);
        self.cache.pop_lru();
        Ok(())
    }

    /// Whether a page is currently resident (test observability).
    pub fn is_resident(&self, pid: PageId) -> bool {
        self.cache.contains(&pid)
    }

    pub fn resident_count(&self) -> usize {
        self.cache.len()
    }

    // Narrow header pass-through for the index and executor layers.

    pub fn page_count(&self) -> u32 {
        self.pager.page_count()
    }

    pub fn index_root(&self) -> Option<PageId> {
        self.pager.index_root()
    }

    pub fn set_index_root(&mut self, root: Option<PageId>) {
        self.pager.set_index_root(root);
    }

    pub fn first_data_page(&self) -> Option<PageId> {
        self.pager.first_data_page()
    }

    pub fn set_first_data_page(&mut self, page: Option<PageId>) {
        self.pager.set_first_data_page(page);
    }

    pub fn schema_page(&self) -> Option<PageId> {
        self.pager.schema_page()
    }

    pub fn set_schema_page(&mut self, page: Option<PageId>) {
        self.pager.set_schema_page(page);
    }
}
