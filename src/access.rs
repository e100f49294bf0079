//! Table access layer.
//!
//! - **value/schema/tuple**: Field values, column layouts and rows
//! - **heap**: Heap files, one per table, holding fixed-width tuple slots
//! - **scan**: Sequential iteration over a heap file through the buffer pool

pub mod heap;
pub mod scan;
pub mod schema;
pub mod tuple;
pub mod value;

pub use heap::HeapFile;
pub use scan::HeapFileIterator;
pub use schema::{ColumnInfo, Schema};
pub use tuple::{RecordId, Tuple};
pub use value::{CompareOp, DataType, Value};
