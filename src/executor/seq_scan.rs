//! Sequential scan executor implementation.

use crate::access::scan::HeapFileIterator;
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::catalog::TableId;
use crate::executor::{ExecutionContext, Executor};
use anyhow::{bail, Result};

/// Executor for sequential table scans
pub struct SeqScanExecutor {
    table_id: TableId,
    context: ExecutionContext,
    iter: Option<HeapFileIterator>,
    output_schema: Schema,
}

impl SeqScanExecutor {
    pub fn new(table_id: TableId, context: ExecutionContext) -> Self {
        Self {
            table_id,
            context,
            iter: None,
            output_schema: Schema::new(Vec::new()),
        }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        if self.iter.is_some() {
            return Ok(());
        }

        let file = self.context.catalog.get_file(self.table_id)?;
        self.output_schema = file.schema().as_ref().clone();

        let mut iter = file.iter(&self.context.buffer_pool, self.context.txn);
        iter.open()?;
        self.iter = Some(iter);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        match self.iter.as_mut() {
            Some(iter) => Ok(iter.next()?),
            None => bail!("Executor not initialized. Call init() first."),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        match self.iter.as_mut() {
            Some(iter) => Ok(iter.rewind()?),
            None => bail!("Executor not initialized. Call init() first."),
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}
