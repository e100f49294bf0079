//! Filter executor implementation.
//!
//! Passes through the child's tuples that satisfy a single-column
//! comparison against a constant.

use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::access::value::{CompareOp, Value};
use crate::executor::Executor;
use crate::storage::StorageError;
use anyhow::{bail, Result};
use std::fmt;

/// `column <op> operand`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: usize,
    pub op: CompareOp,
    pub operand: Value,
}

impl Predicate {
    pub fn new(column: usize, op: CompareOp, operand: Value) -> Self {
        Self {
            column,
            op,
            operand,
        }
    }

    /// False for tuples without the column.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        tuple
            .value(self.column)
            .is_some_and(|value| value.compare(self.op, &self.operand))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${} {} {}", self.column, self.op, self.operand)
    }
}

/// Executor that filters tuples based on a predicate
pub struct FilterExecutor {
    child: Box<dyn Executor>,
    predicate: Predicate,
    initialized: bool,
}

impl FilterExecutor {
    pub fn new(child: Box<dyn Executor>, predicate: Predicate) -> Self {
        Self {
            child,
            predicate,
            initialized: false,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl Executor for FilterExecutor {
    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.child.init()?;
        let schema = self.child.output_schema();
        if self.predicate.column >= schema.len() {
            return Err(StorageError::SchemaMismatch(format!(
                "predicate {} names column {} of a {}-column input",
                self.predicate,
                self.predicate.column,
                schema.len()
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

        while let Some(tuple) = self.child.next()? {
            if self.predicate.matches(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> Result<()> {
        self.child.rewind()
    }

    fn output_schema(&self) -> &Schema {
        self.child.output_schema()
    }
}
