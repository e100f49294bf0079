//! Table schemas and the fixed-width tuple codec built on them.

use crate::access::value::{DataType, Value};
use crate::storage::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};

/// Information about a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of columns. Fixes the width of every tuple slot of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnInfo>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    /// Convenience constructor for schemas given as `(name, type)` pairs.
    pub fn from_pairs(pairs: &[(&str, DataType)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(name, data_type)| ColumnInfo::new(*name, *data_type))
                .collect(),
        )
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&ColumnInfo> {
        self.columns.get(index)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn data_types(&self) -> Vec<DataType> {
        self.columns.iter().map(|c| c.data_type).collect()
    }

    /// Bytes occupied by one encoded tuple.
    pub fn tuple_size(&self) -> usize {
        self.columns.iter().map(|c| c.data_type.fixed_len()).sum()
    }

    /// Verifies that `values` lines up with this schema.
    pub fn check(&self, values: &[Value]) -> StorageResult<()> {
        if values.len() != self.columns.len() {
            return Err(StorageError::SchemaMismatch(format!(
                "expected {} values, got {}",
                self.columns.len(),
                values.len()
            )));
        }
        for (value, column) in values.iter().zip(&self.columns) {
            if value.data_type() != column.data_type {
                return Err(StorageError::SchemaMismatch(format!(
                    "column '{}' is {}, got {}",
                    column.name,
                    column.data_type,
                    value.data_type()
                )));
            }
        }
        Ok(())
    }

    pub fn encode(&self, values: &[Value]) -> StorageResult<Vec<u8>> {
        self.check(values)?;
        let mut out = Vec::with_capacity(self.tuple_size());
        for value in values {
            value.encode(&mut out)?;
        }
        Ok(out)
    }

    pub fn decode(&self, data: &[u8]) -> StorageResult<Vec<Value>> {
        if data.len() != self.tuple_size() {
            return Err(StorageError::InvalidTupleData(format!(
                "expected {} bytes, got {}",
                self.tuple_size(),
                data.len()
            )));
        }
        let mut buf = data;
        self.columns
            .iter()
            .map(|column| Value::decode(column.data_type, &mut buf))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Schema {
        Schema::from_pairs(&[
            ("id", DataType::Int32),
            ("name", DataType::Varchar),
            ("active", DataType::Boolean),
        ])
    }

    #[test]
    fn test_tuple_size() {
        assert_eq!(people().tuple_size(), 4 + 132 + 1);
        assert_eq!(Schema::from_pairs(&[("a", DataType::Int32)]).tuple_size(), 4);
    }

    #[test]
    fn test_column_lookup() {
        let schema = people();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
        assert_eq!(schema.column(2).map(|c| c.data_type), Some(DataType::Boolean));
    }

    #[test]
    fn test_encode_decode() -> StorageResult<()> {
        let schema = people();
        let values = vec![
            Value::Int32(-3),
            Value::String("Ada".into()),
            Value::Boolean(true),
        ];
        let bytes = schema.encode(&values)?;
        assert_eq!(bytes.len(), schema.tuple_size());
        assert_eq!(schema.decode(&bytes)?, values);
        Ok(())
    }

    #[test]
    fn test_check_rejects_mismatch() {
        let schema = people();
        assert!(matches!(
            schema.check(&[Value::Int32(1)]),
            Err(StorageError::SchemaMismatch(_))
        ));
        assert!(matches!(
            schema.check(&[
                Value::String("oops".into()),
                Value::String("Ada".into()),
                Value::Boolean(true),
            ]),
            Err(StorageError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_decode_wrong_length() {
        let schema = people();
        assert!(schema.decode(&[0u8; 5]).is_err());
    }
}
