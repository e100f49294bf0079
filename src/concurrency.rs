//! Concurrency control.
//!
//! Page-level strict two-phase locking: shared locks for reads, exclusive
//! locks for writes, all held until the transaction completes. Deadlocks are
//! detected on request over the wait-for graph and reported to the requester.

pub mod lock;

pub use lock::{Lock, LockError, LockGrant, LockManager, LockMode};
