//! Insert executor implementation.

use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::access::value::{DataType, Value};
use crate::catalog::TableId;
use crate::executor::{ExecutionContext, Executor};
use crate::storage::StorageError;
use anyhow::{bail, Result};

/// Inserts every tuple its child produces into a table.
///
/// Yields a single `(count INT)` tuple with the number of rows inserted,
/// then nothing. Rewinding rewinds the child and makes the next call to
/// `next()` insert its rows again.
pub struct InsertExecutor {
    table_id: TableId,
    child: Box<dyn Executor>,
    context: ExecutionContext,
    output_schema: Schema,
    done: bool,
    initialized: bool,
}

impl InsertExecutor {
    pub fn new(table_id: TableId, child: Box<dyn Executor>, context: ExecutionContext) -> Self {
        Self {
            table_id,
            child,
            context,
            output_schema: Schema::from_pairs(&[("count", DataType::Int32)]),
            done: false,
            initialized: false,
        }
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.child.init()?;
        let table_schema = self.context.catalog.schema(self.table_id)?;
        if self.child.output_schema().data_types() != table_schema.data_types() {
            return Err(StorageError::SchemaMismatch(format!(
                "cannot insert {:?} rows into table {} of {:?}",
                self.child.output_schema().data_types(),
                self.table_id,
                table_schema.data_types()
            ))
            .into());
        }

        self.initialized = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.initialized {
            bail!("Executor not initialized. Call init() first.");
        }
        if self.done {
            return Ok(None);
        }

        let mut inserted = 0;
        while let Some(tuple) = self.child.next()? {
            self.context.buffer_pool.insert_tuple(
                self.context.txn,
                self.table_id,
                Tuple::new(tuple.values),
            )?;
            inserted += 1;
        }

        self.done = true;
        Ok(Some(Tuple::new(vec![Value::Int32(inserted)])))
    }

    fn rewind(&mut self) -> Result<()> {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}

/// Produces a fixed list of rows. The usual child of an insert.
pub struct ValuesExecutor {
    schema: Schema,
    rows: Vec<Vec<Value>>,
    cursor: usize,
}

impl ValuesExecutor {
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self {
            schema,
            rows,
            cursor: 0,
        }
    }
}

impl Executor for ValuesExecutor {
    fn init(&mut self) -> Result<()> {
        for row in &self.rows {
            self.schema.check(row)?;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        let row = self.rows.get(self.cursor).cloned().map(Tuple::new);
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn output_schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{ids, people};
    use crate::executor::{collect_all, SeqScanExecutor};

    fn person(id: i32, name: &str, age: i32) -> Vec<Value> {
        vec![
            Value::Int32(id),
            Value::String(name.into()),
            Value::Int32(age),
        ]
    }

    #[test]
    fn test_insert_reports_count() -> Result<()> {
        let t = people(&[(1, "a", 1)])?;
        let txn = t.db.begin();
        let ctx = ExecutionContext::for_database(&t.db, txn.id());
        let schema = t.db.catalog().schema(t.table)?.as_ref().clone();

        let values = ValuesExecutor::new(schema, vec![person(2, "b", 2), person(3, "c", 3)]);
        let mut insert = InsertExecutor::new(t.table, Box::new(values), ctx.clone());
        insert.init()?;

        let count = insert.next()?.map(|t| t.values);
        assert_eq!(count, Some(vec![Value::Int32(2)]));
        assert!(insert.next()?.is_none());

        let mut scan = SeqScanExecutor::new(t.table, ctx);
        assert_eq!(ids(&collect_all(&mut scan)?), vec![1, 2, 3]);
        txn.commit()?;
        Ok(())
    }

    #[test]
    fn test_rewind_inserts_again() -> Result<()> {
        let t = people(&[(1, "a", 1), (2, "b", 2)])?;
        let txn = t.db.begin();
        let ctx = ExecutionContext::for_database(&t.db, txn.id());

        let values = ValuesExecutor::new(
            t.db.catalog().schema(t.table)?.as_ref().clone(),
            vec![person(9, "z", 9)],
        );
        let mut insert = InsertExecutor::new(t.table, Box::new(values), ctx.clone());
        assert_eq!(collect_all(&mut insert)?.len(), 1);

        insert.rewind()?;
        let again = insert.next()?.map(|t| t.values);
        assert_eq!(again, Some(vec![Value::Int32(1)]));

        let mut scan = SeqScanExecutor::new(t.table, ctx);
        assert_eq!(ids(&collect_all(&mut scan)?), vec![1, 2, 9, 9]);
        Ok(())
    }

    #[test]
    fn test_insert_schema_mismatch() -> Result<()> {
        let t = people(&[])?;
        let txn = t.db.begin();
        let ctx = ExecutionContext::for_database(&t.db, txn.id());

        let narrow = Schema::from_pairs(&[("id", DataType::Int32)]);
        let values = ValuesExecutor::new(narrow, vec![vec![Value::Int32(1)]]);
        let mut insert = InsertExecutor::new(t.table, Box::new(values), ctx);
        assert!(insert.init().is_err());
        Ok(())
    }

    #[test]
    fn test_values_rejects_bad_rows() {
        let schema = Schema::from_pairs(&[("id", DataType::Int32)]);
        let mut values = ValuesExecutor::new(schema, vec![vec![Value::Boolean(true)]]);
        assert!(values.init().is_err());
    }
}
