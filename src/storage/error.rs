//! Storage layer error types.

use crate::concurrency::lock::LockError;
use crate::storage::page::{PageId, TableId};
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Lock acquisition failed; the owning transaction must abort.
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Buffer pool is full: every resident page is dirty")]
    BufferPoolFull,

    #[error("Tuple not found: slot {slot_id} of page {page_id} is empty")]
    TupleNotFound { page_id: PageId, slot_id: u16 },

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Invalid slot ID: {slot_id} (max: {max_slot})")]
    InvalidSlotId { slot_id: u16, max_slot: u16 },

    #[error("Page is full: {0}")]
    PageFull(PageId),

    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Table mismatch: expected table {expected}, got page of table {found}")]
    TableMismatch { expected: TableId, found: TableId },

    #[error("Table not found: {0}")]
    TableNotFound(TableId),

    #[error("Unknown table name: {0}")]
    UnknownTable(String),

    #[error("Table {0} has uncommitted changes")]
    TableBusy(TableId),

    #[error("Corrupt page {page_id}: {reason}")]
    CorruptPage { page_id: PageId, reason: String },

    #[error("Invalid tuple data: {0}")]
    InvalidTupleData(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Iterator is not open")]
    IteratorClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Returns true if the transaction that hit this error must be aborted.
    pub fn is_abort_required(&self) -> bool {
        matches!(self, StorageError::Lock(LockError::Deadlock { .. }))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
