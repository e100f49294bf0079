pub mod lru;
pub mod replacer;

use crate::access::tuple::{RecordId, Tuple};
use crate::catalog::Catalog;
use crate::concurrency::lock::{LockManager, LockMode};
use crate::storage::page::{HeapPage, PageId, PageRef, TableId};
use crate::storage::{StorageError, StorageResult};
use crate::transaction::TransactionId;
use log::{debug, warn};
use lru::LruReplacer;
use parking_lot::{Mutex, RwLock};
use replacer::{FrameId, Replacer};
use std::collections::HashMap;
use std::sync::Arc;

/// Access a caller asks for when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

impl Permissions {
    pub fn lock_mode(&self) -> LockMode {
        match self {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

#[derive(Debug)]
struct Frame {
    page_id: PageId,
    page: PageRef,
}

/// Resident pages and their bookkeeping. Guarded as a whole by one mutex.
#[derive(Debug)]
struct FrameTable {
    frames: Vec<Option<Frame>>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    replacer: Box<dyn Replacer>,
}

impl FrameTable {
    fn new(capacity: usize, replacer: Box<dyn Replacer>) -> Self {
        Self {
            frames: (0..capacity).map(|_| None).collect(),
            page_table: HashMap::with_capacity(capacity),
            // Pop from the back so frame 0 is handed out first.
            free_list: (0..capacity).rev().collect(),
            replacer,
        }
    }

    fn lookup(&mut self, page_id: PageId) -> Option<PageRef> {
        let frame_id = *self.page_table.get(&page_id)?;
        self.replacer.record_access(frame_id);
        self.frames[frame_id]
            .as_ref()
            .map(|frame| Arc::clone(&frame.page))
    }

    /// Finds a frame for a new page: a free one, else the least recently used
    /// frame holding a clean, unlatched page.
    fn allocate_frame(&mut self) -> StorageResult<FrameId> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(frame_id);
        }

        let frames = &self.frames;
        let evictable = |frame_id: FrameId| {
            frames[frame_id]
                .as_ref()
                .and_then(|frame| frame.page.try_read())
                .is_some_and(|page| !page.is_dirty())
        };

        let Some(victim) = self.replacer.victim(&evictable) else {
            warn!(
                "Buffer pool exhausted: all {} resident pages are dirty",
                self.page_table.len()
            );
            return Err(StorageError::BufferPoolFull);
        };

        if let Some(frame) = self.frames[victim].take() {
            debug!("Evicting page {} from frame {}", frame.page_id, victim);
            self.page_table.remove(&frame.page_id);
        }
        Ok(victim)
    }

    /// Places `page` in the cache, replacing any resident instance of the
    /// same page.
    fn install(&mut self, page_id: PageId, page: PageRef) -> StorageResult<()> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => {
                let frame_id = self.allocate_frame()?;
                self.page_table.insert(page_id, frame_id);
                frame_id
            }
        };
        self.frames[frame_id] = Some(Frame { page_id, page });
        self.replacer.record_access(frame_id);
        Ok(())
    }

    fn remove(&mut self, page_id: PageId) -> Option<PageRef> {
        let frame_id = self.page_table.remove(&page_id)?;
        self.replacer.remove(frame_id);
        self.free_list.push(frame_id);
        self.frames[frame_id].take().map(|frame| frame.page)
    }

    /// Resident pages whose most recent dirtier is `txn`.
    fn dirtied_by(&self, txn: TransactionId) -> Vec<(PageId, PageRef)> {
        self.frames
            .iter()
            .flatten()
            .filter(|frame| frame.page.read().dirtied_by() == Some(txn))
            .map(|frame| (frame.page_id, Arc::clone(&frame.page)))
            .collect()
    }
}

/// Fixed-capacity page cache shared by every transaction.
///
/// Every page access goes through [`BufferPool::get_page`], which takes the
/// page lock for the calling transaction before touching the cache. Dirty
/// pages stay resident until their transaction completes: commit writes them
/// back, abort throws them away.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    frames: Mutex<FrameTable>,
    capacity: usize,
    page_size: usize,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, capacity: usize, page_size: usize) -> Self {
        Self::with_replacer(
            catalog,
            capacity,
            page_size,
            Box::new(LruReplacer::new(capacity)),
        )
    }

    pub fn with_replacer(
        catalog: Arc<Catalog>,
        capacity: usize,
        page_size: usize,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                catalog,
                lock_manager: LockManager::new(),
                frames: Mutex::new(FrameTable::new(capacity, replacer)),
                capacity,
                page_size,
            }),
        }
    }

    /// Fetches a page on behalf of `txn`, locking it in the mode `perm`
    /// calls for.
    ///
    /// Blocks while another transaction holds a conflicting lock. Fails with
    /// a deadlock error if waiting would never end, in which case `txn` must
    /// be aborted.
    pub fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> StorageResult<PageRef> {
        self.inner
            .lock_manager
            .acquire(txn, page_id, perm.lock_mode())?;

        let mut table = self.inner.frames.lock();
        self.resident_or_load(&mut table, txn, page_id)
    }

    /// Fetches a page with an exclusive lock for `txn` and runs `f` on it
    /// under the page's write latch.
    ///
    /// The frame table stays locked until `f` returns, so the page cannot be
    /// evicted between the fetch and the change. `f` marks the page dirty if
    /// it modifies it.
    pub fn update_page<T>(
        &self,
        txn: TransactionId,
        page_id: PageId,
        f: impl FnOnce(&mut HeapPage) -> StorageResult<T>,
    ) -> StorageResult<(T, PageRef)> {
        self.inner
            .lock_manager
            .acquire(txn, page_id, LockMode::Exclusive)?;

        let mut table = self.inner.frames.lock();
        let page = self.resident_or_load(&mut table, txn, page_id)?;
        let result = {
            let mut guard = page.write();
            f(&mut *guard)?
        };
        Ok((result, page))
    }

    fn resident_or_load(
        &self,
        table: &mut FrameTable,
        txn: TransactionId,
        page_id: PageId,
    ) -> StorageResult<PageRef> {
        if let Some(page) = table.lookup(page_id) {
            return Ok(page);
        }

        let file = self.inner.catalog.get_file(page_id.table_id)?;
        let page: PageRef = Arc::new(RwLock::new(file.read_page(page_id)?));
        debug!("Loaded page {} for {}", page_id, txn);
        table.install(page_id, Arc::clone(&page))?;
        Ok(page)
    }

    /// Adds a tuple to a table and returns where it was stored.
    pub fn insert_tuple(
        &self,
        txn: TransactionId,
        table_id: TableId,
        tuple: Tuple,
    ) -> StorageResult<RecordId> {
        let file = self.inner.catalog.get_file(table_id)?;
        let (record_id, pages) = file.insert_tuple(self, txn, &tuple)?;
        for page in pages {
            self.mark_dirty(txn, page)?;
        }
        Ok(record_id)
    }

    /// Removes the tuple named by `tuple.record_id` from its table.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> StorageResult<()> {
        let record_id = tuple.record_id.ok_or(StorageError::MissingRecordId)?;
        let file = self.inner.catalog.get_file(record_id.page_id.table_id)?;
        let page = file.delete_tuple(self, txn, tuple)?;
        self.mark_dirty(txn, page)
    }

    /// Records `txn` as the page's dirtier and refreshes its cache entry.
    fn mark_dirty(&self, txn: TransactionId, page: PageRef) -> StorageResult<()> {
        let page_id = {
            let mut guard = page.write();
            guard.mark_dirty(Some(txn));
            guard.page_id()
        };
        self.inner.frames.lock().install(page_id, page)
    }

    /// Ends a transaction.
    ///
    /// On commit every page `txn` dirtied is written to its file and marked
    /// clean; on abort those pages are dropped from the cache so the next
    /// fetch reads the pre-transaction image. Either way all of `txn`'s locks
    /// are released afterwards. Calling this again for the same transaction
    /// does nothing.
    ///
    /// If a commit fails to write a page the locks stay held; the caller is
    /// expected to abort. Pages written before the failure stay on disk and
    /// abort only drops the rest, so a failed commit can leave the
    /// transaction partly applied. There is no log to undo it.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> StorageResult<()> {
        if commit {
            self.flush_pages(txn)?;
        } else {
            let mut table = self.inner.frames.lock();
            for (page_id, _) in table.dirtied_by(txn) {
                debug!("Discarding page {} dirtied by {}", page_id, txn);
                table.remove(page_id);
            }
        }

        let released = self.inner.lock_manager.release_all(txn);
        debug!(
            "{} {} ({} locks released)",
            txn,
            if commit { "committed" } else { "aborted" },
            released
        );
        Ok(())
    }

    /// Writes every page `txn` dirtied and marks it clean.
    pub fn flush_pages(&self, txn: TransactionId) -> StorageResult<()> {
        let table = self.inner.frames.lock();
        for (_, page) in table.dirtied_by(txn) {
            self.write_back(&page)?;
        }
        Ok(())
    }

    /// Writes one resident page if it is dirty.
    ///
    /// Writing pages of running transactions defeats abort, so this is for
    /// shutdown and tests.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        let page = self.inner.frames.lock().lookup(page_id);
        match page {
            Some(page) => self.write_back(&page),
            None => Ok(()),
        }
    }

    /// Writes every dirty resident page. Same caveat as [`Self::flush_page`].
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let pages: Vec<PageRef> = {
            let table = self.inner.frames.lock();
            table
                .frames
                .iter()
                .flatten()
                .map(|frame| Arc::clone(&frame.page))
                .collect()
        };
        for page in pages {
            self.write_back(&page)?;
        }
        Ok(())
    }

    fn write_back(&self, page: &PageRef) -> StorageResult<()> {
        let mut guard = page.write();
        if !guard.is_dirty() {
            return Ok(());
        }
        let file = self.inner.catalog.get_file(guard.page_id().table_id)?;
        file.write_page(&guard)?;
        guard.mark_dirty(None);
        Ok(())
    }

    /// Drops a page from the cache without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        self.inner.frames.lock().remove(page_id);
    }

    /// Releases one lock before the transaction ends.
    ///
    /// This breaks strict two-phase locking: another transaction may change
    /// the page before this one completes. The caller must not touch the
    /// page again within the transaction.
    pub fn unsafe_release_page(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.inner.lock_manager.release(txn, page_id)
    }

    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.inner.lock_manager.holds_lock(txn, page_id)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.inner.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    pub fn resident_pages(&self) -> Vec<PageId> {
        let mut pages: Vec<_> = self.inner.frames.lock().page_table.keys().copied().collect();
        pages.sort();
        pages
    }

    /// Whether any resident page of `table_id` holds uncommitted changes.
    pub fn has_dirty_pages(&self, table_id: TableId) -> bool {
        self.inner
            .frames
            .lock()
            .frames
            .iter()
            .flatten()
            .any(|frame| frame.page_id.table_id == table_id && frame.page.read().is_dirty())
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.inner.frames.lock().page_table.contains_key(&page_id)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("capacity", &self.inner.capacity)
            .field("page_size", &self.inner.page_size)
            .finish()
    }
}
