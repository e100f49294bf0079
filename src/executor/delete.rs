//! Delete executor implementation.

use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::access::value::{DataType, Value};
use crate::executor::{ExecutionContext, Executor};
use anyhow::{bail, Result};

/// Deletes every tuple its child produces.
///
/// The child must yield stored tuples (with record ids), typically a scan
/// or a filter over one. Yields a single `(count INT)` tuple.
pub struct DeleteExecutor {
    child: Box<dyn Executor>,
    context: ExecutionContext,
    output_schema: Schema,
    done: bool,
    initialized: bool,
}

impl DeleteExecutor {
    pub fn new(child: Box<dyn Executor>, context: ExecutionContext) -> Self {
        Self {
            child,
            context,
            output_schema: Schema::from_pairs(&[("count", DataType::Int32)]),
            done: false,
            initialized: false,
        }
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> Result<()> {
        if !self.initialized {
            self.child.init()?;
            self.initialized = true;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.initialized {
            bail!("Executor not initialized. Call init() first.");
        }
        if self.done {
            return Ok(None);
        }

        let mut deleted = 0;
        while let Some(tuple) = self.child.next()? {
            self.context
                .buffer_pool
                .delete_tuple(self.context.txn, &tuple)?;
            deleted += 1;
        }

        self.done = true;
        Ok(Some(Tuple::new(vec![Value::Int32(deleted)])))
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
