use crate::access::scan::HeapFileIterator;
use crate::access::schema::Schema;
use crate::access::tuple::{RecordId, Tuple};
use crate::storage::page::heap_page::slots_per_page;
use crate::storage::page::{HeapPage, PageId, PageRef, TableId};
use crate::storage::{BufferPool, PageManager, StorageError, StorageResult};
use crate::transaction::TransactionId;
use log::debug;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// A table stored as an unordered sequence of heap pages in one file.
///
/// Reads and writes here go straight to disk. Transactions reach the pages
/// through the buffer pool, which calls back into [`HeapFile::read_page`] and
/// [`HeapFile::write_page`].
#[derive(Debug)]
pub struct HeapFile {
    table_id: TableId,
    path: PathBuf,
    schema: Arc<Schema>,
    page_size: usize,
    pages: Mutex<PageManager>,
}

impl HeapFile {
    /// Creates an empty table file, truncating anything already at `path`.
    pub fn create(path: impl AsRef<Path>, schema: Schema, page_size: usize) -> StorageResult<Self> {
        let manager = PageManager::create(path.as_ref(), page_size)?;
        Self::from_manager(path.as_ref(), schema, manager)
    }

    /// Opens a table file, creating it empty if it does not exist.
    pub fn open(path: impl AsRef<Path>, schema: Schema, page_size: usize) -> StorageResult<Self> {
        let path = path.as_ref();
        let manager = if path.exists() {
            PageManager::open(path, page_size)?
        } else {
            PageManager::create(path, page_size)?
        };
        Self::from_manager(path, schema, manager)
    }

    fn from_manager(path: &Path, schema: Schema, manager: PageManager) -> StorageResult<Self> {
        let page_size = manager.page_size();
        let tuple_size = schema.tuple_size();
        if tuple_size == 0 || slots_per_page(page_size, tuple_size) == 0 {
            return Err(StorageError::SchemaMismatch(format!(
                "tuples of {} bytes do not fit in {} byte pages",
                tuple_size, page_size
            )));
        }

        let path = path.canonicalize()?;
        let table_id = Self::table_id_for(&path);
        debug!("Opened table file {} as table {}", path.display(), table_id);

        Ok(Self {
            table_id,
            path,
            schema: Arc::new(schema),
            page_size,
            pages: Mutex::new(manager),
        })
    }

    /// Table id of the file at `path`: FNV-1a over the path bytes. Callers
    /// pass a canonical path so every way of naming the file agrees.
    pub fn table_id_for(path: &Path) -> TableId {
        path.to_string_lossy()
            .bytes()
            .fold(FNV_OFFSET_BASIS, |hash, byte| {
                (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
            })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of whole pages in the file.
    pub fn num_pages(&self) -> StorageResult<u32> {
        Ok(self.pages.lock().num_pages()?)
    }

    /// Reads a page image from disk.
    pub fn read_page(&self, page_id: PageId) -> StorageResult<HeapPage> {
        self.check_table(page_id)?;

        let mut data = HeapPage::empty_page_data(self.page_size);
        {
            let mut pages = self.pages.lock();
            if page_id.page_number >= pages.num_pages()? {
                return Err(StorageError::PageNotFound(page_id));
            }
            pages.read_page(page_id.page_number, &mut data)?;
        }
        HeapPage::new(page_id, data, Arc::clone(&self.schema))
    }

    /// Overwrites the page's region of the file with its current image.
    pub fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let page_id = page.page_id();
        self.check_table(page_id)?;
        self.pages.lock().write_page(page_id.page_number, page.data())?;
        Ok(())
    }

    /// Grows the file by one zero-filled page and returns its id.
    ///
    /// Concurrent callers always get distinct pages.
    pub fn append_empty_page(&self) -> StorageResult<PageId> {
        let page_number = self.pages.lock().allocate_page()?;
        debug!("Table {} grew to {} pages", self.table_id, page_number + 1);
        Ok(PageId::new(self.table_id, page_number))
    }

    /// Stores `tuple` in the first page with a free slot, growing the file
    /// when every page is full.
    ///
    /// Every page inspected is locked exclusively for `txn`. The page that
    /// receives the tuple is marked dirty by `txn` before its latch is
    /// released. Returns the new record id and the modified pages.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<(RecordId, Vec<PageRef>)> {
        self.schema.check(&tuple.values)?;

        for page_number in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_number);
            let (inserted, page) =
                pool.update_page(txn, page_id, |page| Self::try_insert(page, txn, tuple))?;
            if let Some(record_id) = inserted {
                return Ok((record_id, vec![page]));
            }
        }

        // Another inserter may fill a freshly appended page before we lock it.
        loop {
            let page_id = self.append_empty_page()?;
            let (inserted, page) =
                pool.update_page(txn, page_id, |page| Self::try_insert(page, txn, tuple))?;
            if let Some(record_id) = inserted {
                return Ok((record_id, vec![page]));
            }
        }
    }

    fn try_insert(
        page: &mut HeapPage,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<Option<RecordId>> {
        if page.num_empty_slots() == 0 {
            return Ok(None);
        }
        let record_id = page.insert_tuple(tuple)?;
        page.mark_dirty(Some(txn));
        Ok(Some(record_id))
    }

    /// Clears the slot named by the tuple's record id, marks the page dirty
    /// by `txn` and returns it.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<PageRef> {
        let record_id = tuple.record_id.ok_or(StorageError::MissingRecordId)?;
        self.check_table(record_id.page_id)?;

        let not_found = || StorageError::TupleNotFound {
            page_id: record_id.page_id,
            slot_id: record_id.slot_id,
        };
        if record_id.page_id.page_number >= self.num_pages()? {
            return Err(not_found());
        }

        let ((), page) = pool.update_page(txn, record_id.page_id, |page| {
            page.delete_tuple(&record_id).map_err(|e| match e {
                StorageError::InvalidSlotId { .. } => not_found(),
                e => e,
            })?;
            page.mark_dirty(Some(txn));
            Ok(())
        })?;
        Ok(page)
    }

    /// A closed iterator over every tuple of the table, on behalf of `txn`.
    pub fn iter(self: &Arc<Self>, pool: &BufferPool, txn: TransactionId) -> HeapFileIterator {
        HeapFileIterator::new(Arc::clone(self), pool.clone(), txn)
    }

    fn check_table(&self, page_id: PageId) -> StorageResult<()> {
        if page_id.table_id != self.table_id {
            return Err(StorageError::TableMismatch {
                expected: self.table_id,
                found: page_id.table_id,
            });
        }
        Ok(())
    }
}
