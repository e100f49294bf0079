pub mod access;
pub mod catalog;
pub mod concurrency;
pub mod config;
pub mod database;
pub mod executor;
pub mod optimizer;
pub mod storage;
pub mod transaction;

pub use config::DatabaseConfig;
pub use database::Database;
pub use storage::{StorageError, StorageResult};
