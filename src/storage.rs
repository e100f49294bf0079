//! Storage layer implementation for heapdb.
//!
//! This module provides the page-based foundation every table is built on:
//!
//! - **PageManager**: Raw fixed-size page I/O against one file
//! - **HeapPage**: Occupancy bitmap followed by fixed-width tuple slots
//! - **BufferPool**: Fixed-capacity page cache that mediates every page access
//!   through the lock manager and owns eviction and commit/abort handling
//!
//! Pages only ever reach disk through the buffer pool: on commit of the
//! transaction that dirtied them, or through an explicit flush.

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPool, Permissions};
pub use disk::{PageManager, DEFAULT_PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{HeapPage, PageId, PageRef, TableId};
