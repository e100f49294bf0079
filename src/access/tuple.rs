use crate::access::value::Value;
use crate::storage::page::PageId;
use serde::{Deserialize, Serialize};

/// Location of one tuple: the page that holds it and its slot on that page.
///
/// Equality, hashing and ordering are structural (page first, then slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }
}

/// Represents a row in the database
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    /// Set once the tuple has been read from or written to a page.
    pub record_id: Option<RecordId>,
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            record_id: None,
            values,
        }
    }

    pub fn with_record_id(record_id: RecordId, values: Vec<Value>) -> Self {
        Self {
            record_id: Some(record_id),
            values,
        }
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_record_id_equality() {
        let rid1 = RecordId::new(PageId::new(1, 1), 2);
        let rid2 = RecordId::new(PageId::new(1, 1), 2);
        let rid3 = RecordId::new(PageId::new(1, 1), 3);
        let rid4 = RecordId::new(PageId::new(2, 1), 2);

        assert_eq!(rid1, rid2);
        assert_ne!(rid1, rid3);
        assert_ne!(rid1, rid4);

        let set: HashSet<_> = [rid1, rid2, rid3, rid4].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_record_id_ordering() {
        let rid1 = RecordId::new(PageId::new(1, 1), 5);
        let rid2 = RecordId::new(PageId::new(1, 1), 10);
        let rid3 = RecordId::new(PageId::new(1, 2), 3);

        assert!(rid1 < rid2);
        assert!(rid2 < rid3);
    }

    #[test]
    fn test_tuple_creation() {
        let tuple = Tuple::new(vec![Value::Int32(1), Value::String("a".into())]);
        assert!(tuple.record_id.is_none());
        assert_eq!(tuple.value(0), Some(&Value::Int32(1)));
        assert_eq!(tuple.value(2), None);

        let rid = RecordId::new(PageId::new(3, 0), 0);
        let stored = Tuple::with_record_id(rid, tuple.values.clone());
        assert_eq!(stored.record_id, Some(rid));
    }
}
