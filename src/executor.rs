//! Executor layer for query execution.
//!
//! Volcano-style operators over the storage core. Each executor produces
//! tuples one at a time via `next()`; every page it touches is fetched
//! through the buffer pool on behalf of the context's transaction, so
//! operators inherit strict two-phase locking for free.

use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::catalog::Catalog;
use crate::database::Database;
use crate::storage::BufferPool;
use crate::transaction::TransactionId;
use anyhow::Result;
use std::sync::Arc;

pub mod aggregate;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod seq_scan;

pub use aggregate::{AggregateExecutor, AggregateOp};
pub use delete::DeleteExecutor;
pub use filter::{FilterExecutor, Predicate};
pub use insert::{InsertExecutor, ValuesExecutor};
pub use seq_scan::SeqScanExecutor;

/// Trait for all query executors
pub trait Executor: Send {
    /// Initialize the executor. This must be called before `next()`.
    fn init(&mut self) -> Result<()>;

    /// Get the next tuple from the executor.
    /// Returns None when there are no more tuples.
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// Start over from the first tuple.
    fn rewind(&mut self) -> Result<()>;

    /// Get the output schema of this executor. Empty until `init()`.
    fn output_schema(&self) -> &Schema;
}

/// Execution context containing shared resources
#[derive(Clone)]
pub struct ExecutionContext {
    pub catalog: Arc<Catalog>,
    pub buffer_pool: BufferPool,
    pub txn: TransactionId,
}

impl ExecutionContext {
    pub fn new(catalog: Arc<Catalog>, buffer_pool: BufferPool, txn: TransactionId) -> Self {
        Self {
            catalog,
            buffer_pool,
            txn,
        }
    }

    pub fn for_database(db: &Database, txn: TransactionId) -> Self {
        Self::new(Arc::clone(db.catalog()), db.buffer_pool().clone(), txn)
    }
}

/// Runs an executor to completion and collects its output.
pub fn collect_all(executor: &mut dyn Executor) -> Result<Vec<Tuple>> {
    executor.init()?;
    let mut tuples = Vec::new();
    while let Some(tuple) = executor.next()? {
        tuples.push(tuple);
    }
    Ok(tuples)
}
