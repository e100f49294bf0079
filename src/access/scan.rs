use crate::access::heap::HeapFile;
use crate::access::tuple::Tuple;
use crate::storage::page::PageId;
use crate::storage::{BufferPool, Permissions, StorageError, StorageResult};
use crate::transaction::TransactionId;
use std::collections::VecDeque;
use std::sync::Arc;

/// Sequential scan over every tuple of a heap file, page by page.
///
/// Pages are fetched lazily through the buffer pool with read permission,
/// so each page visited stays share-locked by the scanning transaction until
/// it completes. The page count is re-read whenever the scan runs past the
/// last page it knew of, so pages appended after `open` are visited too.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    pool: BufferPool,
    txn: TransactionId,
    open: bool,
    next_page: u32,
    num_pages: u32,
    current: VecDeque<Tuple>,
}

impl HeapFileIterator {
    /// Creates a closed iterator.
    pub fn new(file: Arc<HeapFile>, pool: BufferPool, txn: TransactionId) -> Self {
        Self {
            file,
            pool,
            txn,
            open: false,
            next_page: 0,
            num_pages: 0,
            current: VecDeque::new(),
        }
    }

    pub fn open(&mut self) -> StorageResult<()> {
        self.num_pages = self.file.num_pages()?;
        self.next_page = 0;
        self.current.clear();
        self.open = true;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns whether another tuple is available. Always false when closed.
    pub fn has_next(&mut self) -> StorageResult<bool> {
        if !self.open {
            return Ok(false);
        }
        match self.next()? {
            Some(tuple) => {
                self.current.push_front(tuple);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns the next tuple, or `None` once every page has been visited.
    pub fn next(&mut self) -> StorageResult<Option<Tuple>> {
        if !self.open {
            return Err(StorageError::IteratorClosed);
        }

        loop {
            if let Some(tuple) = self.current.pop_front() {
                return Ok(Some(tuple));
            }

            if self.next_page >= self.num_pages {
                self.num_pages = self.file.num_pages()?;
                if self.next_page >= self.num_pages {
                    return Ok(None);
                }
            }

            let page_id = PageId::new(self.file.table_id(), self.next_page);
            self.next_page += 1;

            let page = self.pool.get_page(self.txn, page_id, Permissions::ReadOnly)?;
            let tuples = page.read().tuples()?;
            self.current = tuples.into();
        }
    }

    /// Restarts the scan from the first page. Locks already taken are kept.
    pub fn rewind(&mut self) -> StorageResult<()> {
        if !self.open {
            return Err(StorageError::IteratorClosed);
        }
        self.open()
    }

    /// Drops the scan position. Locks stay with the transaction.
    pub fn close(&mut self) {
        self.open = false;
        self.current.clear();
        self.next_page = 0;
    }
}
