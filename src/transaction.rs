//! Transactions over the buffer pool.
//!
//! A transaction is nothing more than an id: every lock and every dirty page
//! is tagged with it, and `BufferPool::transaction_complete` ends it. The
//! [`Transaction`] handle wraps that protocol so a transaction that is
//! dropped without committing is rolled back.

pub mod handle;
pub mod id;

pub use handle::Transaction;
pub use id::{TransactionId, TransactionIdGenerator};
