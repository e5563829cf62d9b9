//! Maps page numbers to typed B+ tree nodes, lazily faulting pages in
//! through the page cache and buffer pool, and flushing the dirty set back
//! to the page store.
//!
//! Grounded on `mermoldy-mysqlite`'s `storage/table.rs::Pager`, which owns
//! the only mutable handle to each node and hands out `MutexGuard`s; this
//! version drops the `heapless::Vec<_, TABLE_MAX_PAGES>` fixed-capacity
//! backing store (incompatible with the spec's unbounded append-only page
//! allocation — see DESIGN.md) for a plain `HashMap<u32, Node>`, and adds
//! the page cache / buffer pool fault-in path the teacher's pager never
//! implemented.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, trace};

use crate::errors::{Error, Result};

use super::btree::Node;
use super::cache::{BufferPool, PageCache};
use super::page::{PageStore, SyncConfig, PAGE_SIZE};

/// No child/sibling/parent: used for leaf `next`/`prev` and the sentinel
/// right-child of a freshly initialized internal node.
pub const NONE_PAGE: u32 = 0;

/// Tracks the page-0 root-indirection stub plus the live node map for one
/// open table file.
pub struct Pager {
    store: PageStore,
    cache: PageCache,
    pool: BufferPool,
    nodes: HashMap<u32, Node>,
    dirty: HashSet<u32>,
    high_water: u32,
    root_page_no: u32,
    row_size: usize,
}

impl Pager {
    /// Opens (creating if necessary) the table file at `path`. The
    /// high-water mark is restored from the file size divided by page
    /// size, floored at 1 (page 0 is reserved for the root indirection).
    pub fn open(
        path: impl AsRef<Path>,
        row_size: usize,
        sync: SyncConfig,
        cache_capacity: usize,
        pool_capacity: usize,
    ) -> Result<Self> {
        let mut store = PageStore::open(path, sync)?;
        let size_in_pages = store.size_in_pages()?;
        let high_water = size_in_pages.max(1) as u32;

        let root_page_no = if size_in_pages == 0 {
            NONE_PAGE
        } else {
            let mut buf = [0u8; PAGE_SIZE];
            store.read(0, &mut buf)?;
            u32::from_le_bytes(buf[1..5].try_into().unwrap())
        };

        Ok(Pager {
            store,
            cache: PageCache::new(cache_capacity),
            pool: BufferPool::new(pool_capacity),
            nodes: HashMap::new(),
            dirty: HashSet::new(),
            high_water,
            root_page_no,
            row_size,
        })
    }

    pub fn row_size(&self) -> usize {
        self.row_size
    }

    pub fn root_page_no(&self) -> u32 {
        self.root_page_no
    }

    pub fn set_root_page_no(&mut self, page_no: u32) {
        self.root_page_no = page_no;
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_no == NONE_PAGE
    }

    /// Allocates a fresh page number at the current high-water mark. Not
    /// persisted until the caller inserts a node at that number and flushes.
    pub fn allocate(&mut self) -> u32 {
        let page_no = self.high_water;
        self.high_water += 1;
        page_no
    }

    /// Installs `node` as the in-memory content of `page_no` and marks it
    /// dirty.
    pub fn put(&mut self, page_no: u32, node: Node) {
        self.nodes.insert(page_no, node);
        self.dirty.insert(page_no);
    }

    pub fn mark_dirty(&mut self, page_no: u32) {
        self.dirty.insert(page_no);
    }

    /// Drops a freed page's in-memory node. No file-level reclamation in
    /// this engine: the page number is simply never referenced again.
    pub fn forget(&mut self, page_no: u32) {
        self.nodes.remove(&page_no);
        self.dirty.remove(&page_no);
    }

    /// Returns the node at `page_no`, following the page-0 root indirection
    /// when `page_no == 0`. Faults the page in from disk on first access.
    pub fn page(&mut self, page_no: u32) -> Result<&Node> {
        let resolved = self.resolve(page_no)?;
        self.ensure_loaded(resolved)?;
        Ok(self.nodes.get(&resolved).expect("just loaded"))
    }

    pub fn page_mut(&mut self, page_no: u32) -> Result<&mut Node> {
        let resolved = self.resolve(page_no)?;
        self.ensure_loaded(resolved)?;
        self.dirty.insert(resolved);
        Ok(self.nodes.get_mut(&resolved).expect("just loaded"))
    }

    fn resolve(&self, page_no: u32) -> Result<u32> {
        if page_no != 0 {
            return Ok(page_no);
        }
        if self.root_page_no == NONE_PAGE {
            return Err(Error::Corruption(
                "page 0 dereferenced on an empty tree".into(),
            ));
        }
        Ok(self.root_page_no)
    }

    fn ensure_loaded(&mut self, page_no: u32) -> Result<()> {
        if self.nodes.contains_key(&page_no) {
            return Ok(());
        }
        let buf = match self.cache.get(page_no) {
            Some(buf) => buf,
            None => {
                let mut buf = self.pool.acquire();
                self.store.read(page_no, &mut buf)?;
                self.cache.set(page_no, buf.clone());
                buf
            }
        };
        let node = Node::from_bytes(&buf, self.row_size)?;
        trace!(page_no, "faulted in page");
        self.nodes.insert(page_no, node);
        Ok(())
    }

    /// Serializes every dirty node and writes it through the page store,
    /// then writes the page-0 root stub, then fsyncs.
    pub fn flush(&mut self) -> Result<()> {
        self.write_dirty()?;
        self.write_root_stub()?;
        self.store.flush()
    }

    /// Same as `flush` but defers the fsync: writes are issued immediately
    /// (so subsequent reads in this process observe them) while the
    /// durability barrier is coalesced into the single trailing `sync`.
    pub fn flush_batch(&mut self) -> Result<()> {
        self.write_dirty()?;
        self.write_root_stub()?;
        self.store.flush()
    }

    fn write_dirty(&mut self) -> Result<()> {
        let dirty: Vec<u32> = self.dirty.drain().collect();
        for page_no in dirty {
            let Some(node) = self.nodes.get(&page_no) else {
                continue;
            };
            let buf = node.to_bytes(self.row_size);
            self.store.write(page_no, &buf)?;
            if let Some(old) = self.cache.invalidate(page_no) {
                self.pool.release(old);
            }
        }
        debug!(root = self.root_page_no, "flushed dirty pages");
        Ok(())
    }

    fn write_root_stub(&mut self) -> Result<()> {
        let mut stub = [0u8; PAGE_SIZE];
        if self.root_page_no != NONE_PAGE {
            let root = self.page(self.root_page_no)?;
            stub[0] = root.tag();
        }
        stub[1..5].copy_from_slice(&self.root_page_no.to_le_bytes());
        self.store.write(0, &stub)?;
        if let Some(old) = self.cache.invalidate(0) {
            self.pool.release(old);
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn cache_stats(&self) -> super::cache::CacheStats {
        self.cache.stats()
    }
}
