//! Database configuration.

use crate::storage::{StorageError, StorageResult, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of buffer pool frames.
pub const DEFAULT_PAGES: usize = 50;

/// Largest page size a slot id can still address.
pub const MAX_PAGE_SIZE: usize = 65536;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding one `<table>.dat` file per table.
    pub data_dir: PathBuf,
    /// Size of every page, in bytes.
    pub page_size: usize,
    /// Number of pages the buffer pool holds.
    pub buffer_pool_pages: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("heapdb_data"),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: DEFAULT_PAGES,
        }
    }
}

impl DatabaseConfig {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_pages(mut self, pages: usize) -> Self {
        self.buffer_pool_pages = pages;
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(StorageError::InvalidConfig(format!(
                "page size must be between 1 and {} bytes, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.buffer_pool_pages == 0 {
            return Err(StorageError::InvalidConfig(
                "buffer pool needs at least one page".into(),
            ));
        }
        Ok(())
    }

    /// Path of the file backing table `name`.
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.dat", name))
    }
}
