use super::id::TransactionId;
use crate::storage::{BufferPool, StorageResult};
use log::warn;

/// A running transaction. Rolled back on drop unless committed or aborted.
pub struct Transaction {
    id: TransactionId,
    pool: BufferPool,
    completed: bool,
}

impl Transaction {
    pub fn new(id: TransactionId, pool: BufferPool) -> Self {
        Self {
            id,
            pool,
            completed: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Flushes the pages this transaction dirtied and releases its locks.
    ///
    /// If flushing fails the transaction is aborted instead and the flush
    /// error is returned.
    pub fn commit(mut self) -> StorageResult<()> {
        self.completed = true;
        if let Err(e) = self.pool.transaction_complete(self.id, true) {
            warn!("{} failed to commit, aborting: {}", self.id, e);
            self.pool.transaction_complete(self.id, false)?;
            return Err(e);
        }
        Ok(())
    }

    /// Discards the pages this transaction dirtied and releases its locks.
    pub fn abort(mut self) -> StorageResult<()> {
        self.completed = true;
        self.pool.transaction_complete(self.id, false)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.completed {
            if let Err(e) = self.pool.transaction_complete(self.id, false) {
                warn!("{} failed to roll back on drop: {}", self.id, e);
            }
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("completed", &self.completed)
            .finish()
    }
}
