//! Registry of the tables a database knows about.
//!
//! Maps table ids and names to the heap file (and through it, the schema)
//! backing each table. The buffer pool resolves every page it loads here.

use crate::access::heap::HeapFile;
use crate::access::schema::Schema;
use crate::storage::{StorageError, StorageResult};
use dashmap::DashMap;
use std::sync::Arc;

pub use crate::storage::page::TableId;

#[derive(Debug, Clone)]
pub struct TableEntry {
    pub name: String,
    pub file: Arc<HeapFile>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    tables: DashMap<TableId, TableEntry>,
    names: DashMap<String, TableId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under `name`. A previous table with the same name
    /// or the same file is replaced.
    pub fn add_table(&self, name: impl Into<String>, file: Arc<HeapFile>) -> TableId {
        let name = name.into();
        let table_id = file.table_id();

        if let Some(old_id) = self.names.insert(name.clone(), table_id) {
            if old_id != table_id {
                self.tables.remove(&old_id);
            }
        }
        let entry = TableEntry {
            name: name.clone(),
            file,
        };
        if let Some(old) = self.tables.insert(table_id, entry) {
            if old.name != name {
                self.names.remove_if(&old.name, |_, id| *id == table_id);
            }
        }
        table_id
    }

    pub fn get_file(&self, table_id: TableId) -> StorageResult<Arc<HeapFile>> {
        self.tables
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or(StorageError::TableNotFound(table_id))
    }

    pub fn schema(&self, table_id: TableId) -> StorageResult<Arc<Schema>> {
        Ok(Arc::clone(self.get_file(table_id)?.schema()))
    }

    pub fn table_id(&self, name: &str) -> StorageResult<TableId> {
        self.names
            .get(name)
            .map(|id| *id)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))
    }

    pub fn table_name(&self, table_id: TableId) -> StorageResult<String> {
        self.tables
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or(StorageError::TableNotFound(table_id))
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.tables.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        self.tables.clear();
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::DataType;
    use anyhow::Result;
    use tempfile::tempdir;

    fn file(dir: &std::path::Path, name: &str) -> Result<Arc<HeapFile>> {
        Ok(Arc::new(HeapFile::create(
            dir.join(name),
            Schema::from_pairs(&[("id", DataType::Int32)]),
            4096,
        )?))
    }

    #[test]
    fn test_lookup_by_id_and_name() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new();
        let users = catalog.add_table("users", file(dir.path(), "users.dat")?);

        assert_eq!(catalog.table_id("users")?, users);
        assert_eq!(catalog.table_name(users)?, "users");
        assert_eq!(catalog.schema(users)?.len(), 1);
        assert_eq!(catalog.get_file(users)?.table_id(), users);

        assert!(matches!(
            catalog.table_id("nope"),
            Err(StorageError::UnknownTable(_))
        ));
        assert!(matches!(
            catalog.get_file(users.wrapping_add(1)),
            Err(StorageError::TableNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_name_reuse_replaces_table() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new();
        let old = catalog.add_table("t", file(dir.path(), "a.dat")?);
        let new = catalog.add_table("t", file(dir.path(), "b.dat")?);

        assert_ne!(old, new);
        assert_eq!(catalog.table_id("t")?, new);
        assert_eq!(catalog.table_ids(), vec![new]);
        Ok(())
    }

    #[test]
    fn test_rename_same_file() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new();
        let f = file(dir.path(), "a.dat")?;
        let id = catalog.add_table("first", Arc::clone(&f));
        catalog.add_table("second", f);

        assert_eq!(catalog.table_id("second")?, id);
        assert!(catalog.table_id("first").is_err());

        catalog.clear();
        assert!(catalog.table_ids().is_empty());
        Ok(())
    }
}
