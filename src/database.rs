use crate::access::heap::HeapFile;
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::catalog::{Catalog, TableId};
use crate::config::DatabaseConfig;
use crate::storage::{BufferPool, StorageError, StorageResult};
use crate::transaction::{Transaction, TransactionId, TransactionIdGenerator};
use log::info;
use std::sync::Arc;

/// Entry point tying the catalog, buffer pool and lock manager together.
///
/// Each `Database` is self-contained; opening two over different directories
/// gives two independent stores.
pub struct Database {
    config: DatabaseConfig,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
    txn_ids: TransactionIdGenerator,
}

impl Database {
    /// Opens a database in `config.data_dir`, creating the directory if
    /// needed. Tables must be registered with [`Database::create_table`] or
    /// [`Database::open_table`] before use.
    pub fn open(config: DatabaseConfig) -> StorageResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let catalog = Arc::new(Catalog::new());
        let buffer_pool = BufferPool::new(
            Arc::clone(&catalog),
            config.buffer_pool_pages,
            config.page_size,
        );
        info!(
            "Opened database at {} ({} pages of {} bytes)",
            config.data_dir.display(),
            config.buffer_pool_pages,
            config.page_size
        );

        Ok(Self {
            config,
            catalog,
            buffer_pool,
            txn_ids: TransactionIdGenerator::new(),
        })
    }

    /// Creates an empty table, replacing any existing file of that name.
    ///
    /// Fails with `TableBusy` while a running transaction has uncommitted
    /// changes to the table being replaced. Transactions that only read it
    /// are not detected, so replace tables only while none are running.
    pub fn create_table(&self, name: &str, schema: Schema) -> StorageResult<TableId> {
        if let Ok(old_id) = self.catalog.table_id(name) {
            if self.buffer_pool.has_dirty_pages(old_id) {
                return Err(StorageError::TableBusy(old_id));
            }
        }
        let file = HeapFile::create(self.config.table_path(name), schema, self.config.page_size)?;
        let table_id = file.table_id();
        for page_id in self.buffer_pool.resident_pages() {
            if page_id.table_id == table_id {
                self.buffer_pool.discard_page(page_id);
            }
        }
        Ok(self.catalog.add_table(name, Arc::new(file)))
    }

    /// Registers the table stored in `<data_dir>/<name>.dat`, creating the
    /// file if it does not exist.
    pub fn open_table(&self, name: &str, schema: Schema) -> StorageResult<TableId> {
        if let Ok(table_id) = self.catalog.table_id(name) {
            return Ok(table_id);
        }
        let file = HeapFile::open(self.config.table_path(name), schema, self.config.page_size)?;
        Ok(self.catalog.add_table(name, Arc::new(file)))
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Starts a transaction.
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.txn_ids.next(), self.buffer_pool.clone())
    }

    /// Reads every tuple of a table on behalf of `txn`.
    pub fn scan(&self, txn: TransactionId, table_id: TableId) -> StorageResult<Vec<Tuple>> {
        let file = self.catalog.get_file(table_id)?;
        let mut iter = file.iter(&self.buffer_pool, txn);
        iter.open()?;

        let mut tuples = Vec::new();
        while let Some(tuple) = iter.next()? {
            tuples.push(tuple);
        }
        iter.close();
        Ok(tuples)
    }

    /// Writes every dirty page to disk. For shutdown.
    pub fn flush(&self) -> StorageResult<()> {
        self.buffer_pool.flush_all_pages()
    }
}
