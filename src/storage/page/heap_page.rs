//! Slotted heap page: an occupancy bitmap followed by fixed-width tuple slots.
//!
//! ```text
//! +----------------------+--------+--------+-----+--------+---------+
//! | bitmap ceil(n/8) B   | slot 0 | slot 1 | ... | slot n | padding |
//! +----------------------+--------+--------+-----+--------+---------+
//! ```
//!
//! Bit `i` of the bitmap (byte `i / 8`, bit `i % 8`, least significant bit
//! first) is set when slot `i` holds a tuple. Slot width is the schema's tuple
//! size and `n = floor(page_size * 8 / (tuple_size * 8 + 1))`.

use crate::access::schema::Schema;
use crate::access::tuple::{RecordId, Tuple};
use crate::storage::page::PageId;
use crate::storage::{StorageError, StorageResult};
use crate::transaction::TransactionId;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared handle to a resident page. Every caller that fetches the same page
/// from the buffer pool gets the same instance.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Number of tuple slots a page of `page_size` bytes holds.
pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Size of the occupancy bitmap for `num_slots` slots.
pub fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

#[derive(Debug)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    data: Vec<u8>,
    num_slots: usize,
    dirtied_by: Option<TransactionId>,
}

impl HeapPage {
    /// Wraps a page image read from disk. The image length is the page size.
    ///
    /// Fails if the schema does not fit on a page, if the bitmap marks slots
    /// that do not exist, or if an occupied slot does not decode.
    pub fn new(page_id: PageId, data: Vec<u8>, schema: Arc<Schema>) -> StorageResult<Self> {
        let tuple_size = schema.tuple_size();
        if tuple_size == 0 {
            return Err(StorageError::SchemaMismatch("schema has no columns".into()));
        }
        let num_slots = slots_per_page(data.len(), tuple_size);
        if num_slots == 0 {
            return Err(StorageError::SchemaMismatch(format!(
                "tuples of {} bytes do not fit in a {} byte page",
                tuple_size,
                data.len()
            )));
        }
        if num_slots > u16::MAX as usize + 1 {
            return Err(StorageError::SchemaMismatch(format!(
                "{} slots per page exceeds the slot id range",
                num_slots
            )));
        }

        let page = Self {
            page_id,
            schema,
            data,
            num_slots,
            dirtied_by: None,
        };
        page.validate()?;
        Ok(page)
    }

    /// Zero-filled image of an empty page.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    fn validate(&self) -> StorageResult<()> {
        let header = header_size(self.num_slots);
        for bit in self.num_slots..header * 8 {
            if self.bit(bit) {
                return Err(StorageError::CorruptPage {
                    page_id: self.page_id,
                    reason: format!("bitmap marks nonexistent slot {}", bit),
                });
            }
        }
        for slot in 0..self.num_slots {
            if self.bit(slot) {
                self.schema
                    .decode(self.slot_bytes(slot))
                    .map_err(|e| StorageError::CorruptPage {
                        page_id: self.page_id,
                        reason: format!("slot {}: {}", slot, e),
                    })?;
            }
        }
        Ok(())
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Raw page image, exactly page-size bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots).filter(|&slot| !self.bit(slot)).count()
    }

    pub fn is_slot_used(&self, slot_id: u16) -> bool {
        (slot_id as usize) < self.num_slots && self.bit(slot_id as usize)
    }

    /// Writes the tuple into the lowest free slot and returns its location.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> StorageResult<RecordId> {
        let bytes = self.schema.encode(&tuple.values)?;
        let slot = (0..self.num_slots)
            .find(|&slot| !self.bit(slot))
            .ok_or(StorageError::PageFull(self.page_id))?;

        let offset = self.slot_offset(slot);
        self.data[offset..offset + bytes.len()].copy_from_slice(&bytes);
        self.set_bit(slot, true);

        Ok(RecordId::new(self.page_id, slot as u16))
    }

    /// Clears the occupancy bit of the slot named by `record_id`.
    pub fn delete_tuple(&mut self, record_id: &RecordId) -> StorageResult<()> {
        if record_id.page_id != self.page_id {
            return Err(StorageError::TupleNotFound {
                page_id: record_id.page_id,
                slot_id: record_id.slot_id,
            });
        }
        self.check_slot(record_id.slot_id)?;
        if !self.bit(record_id.slot_id as usize) {
            return Err(StorageError::TupleNotFound {
                page_id: self.page_id,
                slot_id: record_id.slot_id,
            });
        }

        self.set_bit(record_id.slot_id as usize, false);
        Ok(())
    }

    pub fn get_tuple(&self, slot_id: u16) -> StorageResult<Tuple> {
        self.check_slot(slot_id)?;
        if !self.bit(slot_id as usize) {
            return Err(StorageError::TupleNotFound {
                page_id: self.page_id,
                slot_id,
            });
        }
        self.decode_slot(slot_id as usize)
    }

    /// All stored tuples in slot order.
    pub fn tuples(&self) -> StorageResult<Vec<Tuple>> {
        (0..self.num_slots)
            .filter(|&slot| self.bit(slot))
            .map(|slot| self.decode_slot(slot))
            .collect()
    }

    /// Records which transaction dirtied the page; `None` marks it clean.
    pub fn mark_dirty(&mut self, txn: Option<TransactionId>) {
        self.dirtied_by = txn;
    }

    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.is_some()
    }

    fn decode_slot(&self, slot: usize) -> StorageResult<Tuple> {
        let values = self.schema.decode(self.slot_bytes(slot))?;
        Ok(Tuple::with_record_id(
            RecordId::new(self.page_id, slot as u16),
            values,
        ))
    }

    fn check_slot(&self, slot_id: u16) -> StorageResult<()> {
        if slot_id as usize >= self.num_slots {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: (self.num_slots - 1) as u16,
            });
        }
        Ok(())
    }

    fn slot_offset(&self, slot: usize) -> usize {
        header_size(self.num_slots) + slot * self.schema.tuple_size()
    }

    fn slot_bytes(&self, slot: usize) -> &[u8] {
        let offset = self.slot_offset(slot);
        &self.data[offset..offset + self.schema.tuple_size()]
    }

    fn bit(&self, index: usize) -> bool {
        self.data[index / 8] & (1 << (index % 8)) != 0
    }

    fn set_bit(&mut self, index: usize, used: bool) {
        if used {
            self.data[index / 8] |= 1 << (index % 8);
        } else {
            self.data[index / 8] &= !(1 << (index % 8));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{DataType, Value};
    use crate::storage::DEFAULT_PAGE_SIZE;

    fn two_ints() -> Arc<Schema> {
        Arc::new(Schema::from_pairs(&[
            ("a", DataType::Int32),
            ("b", DataType::Int32),
        ]))
    }

    fn empty_page(page_size: usize) -> HeapPage {
        HeapPage::new(
            PageId::new(1, 0),
            HeapPage::empty_page_data(page_size),
            two_ints(),
        )
        .unwrap()
    }

    fn row(a: i32, b: i32) -> Tuple {
        Tuple::new(vec![Value::Int32(a), Value::Int32(b)])
    }

    #[test]
    fn test_slot_math() {
        assert_eq!(slots_per_page(DEFAULT_PAGE_SIZE, 8), 504);
        assert_eq!(header_size(504), 63);
        assert!(header_size(504) + 504 * 8 <= DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_heap_page_initialization() {
        let page = empty_page(DEFAULT_PAGE_SIZE);
        assert_eq!(page.page_id(), PageId::new(1, 0));
        assert_eq!(page.num_slots(), 504);
        assert_eq!(page.num_empty_slots(), 504);
        assert!(!page.is_dirty());
        assert!(page.tuples().unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_get_tuple() -> StorageResult<()> {
        let mut page = empty_page(DEFAULT_PAGE_SIZE);

        let rid1 = page.insert_tuple(&row(1, 10))?;
        let rid2 = page.insert_tuple(&row(2, 20))?;
        assert_eq!(rid1.slot_id, 0);
        assert_eq!(rid2.slot_id, 1);
        assert_eq!(page.num_empty_slots(), 502);

        let tuple = page.get_tuple(1)?;
        assert_eq!(tuple.values, row(2, 20).values);
        assert_eq!(tuple.record_id, Some(rid2));

        Ok(())
    }

    #[test]
    fn test_delete_frees_slot_for_reuse() -> StorageResult<()> {
        let mut page = empty_page(DEFAULT_PAGE_SIZE);
        let rid0 = page.insert_tuple(&row(1, 1))?;
        page.insert_tuple(&row(2, 2))?;

        page.delete_tuple(&rid0)?;
        assert!(!page.is_slot_used(0));
        assert!(page.get_tuple(0).is_err());
        assert!(matches!(
            page.delete_tuple(&rid0),
            Err(StorageError::TupleNotFound { .. })
        ));

        let reused = page.insert_tuple(&row(3, 3))?;
        assert_eq!(reused.slot_id, 0);
        Ok(())
    }

    #[test]
    fn test_page_full() -> StorageResult<()> {
        let mut page = empty_page(64);
        let capacity = page.num_slots();
        assert_eq!(capacity, 7);

        for i in 0..capacity {
            page.insert_tuple(&row(i as i32, 0))?;
        }
        assert_eq!(page.num_empty_slots(), 0);
        assert!(matches!(
            page.insert_tuple(&row(99, 0)),
            Err(StorageError::PageFull(_))
        ));
        Ok(())
    }

    #[test]
    fn test_invalid_slot_id() {
        let mut page = empty_page(64);
        assert!(matches!(
            page.get_tuple(100),
            Err(StorageError::InvalidSlotId { max_slot: 6, .. })
        ));
        let rid = RecordId::new(PageId::new(1, 0), 7);
        assert!(matches!(
            page.delete_tuple(&rid),
            Err(StorageError::InvalidSlotId { .. })
        ));
    }

    #[test]
    fn test_delete_record_from_other_page() {
        let mut page = empty_page(64);
        let rid = RecordId::new(PageId::new(1, 5), 0);
        assert!(page.delete_tuple(&rid).is_err());
    }

    #[test]
    fn test_from_existing_data() -> StorageResult<()> {
        let mut page = empty_page(DEFAULT_PAGE_SIZE);
        page.insert_tuple(&row(5, 6))?;
        page.insert_tuple(&row(7, 8))?;
        let image = page.data().to_vec();

        let reloaded = HeapPage::new(PageId::new(1, 0), image, two_ints())?;
        let values: Vec<_> = reloaded.tuples()?.into_iter().map(|t| t.values).collect();
        assert_eq!(values, vec![row(5, 6).values, row(7, 8).values]);
        Ok(())
    }

    #[test]
    fn test_corrupt_bitmap_is_rejected() {
        // 7 slots in a 64 byte page: bits 7.. of the single bitmap byte must be 0.
        let mut image = HeapPage::empty_page_data(64);
        image[0] = 0b1000_0000;
        let result = HeapPage::new(PageId::new(1, 0), image, two_ints());
        assert!(matches!(result, Err(StorageError::CorruptPage { .. })));
    }

    #[test]
    fn test_undecodable_slot_is_rejected() {
        let schema = Arc::new(Schema::from_pairs(&[("flag", DataType::Boolean)]));
        let mut image = HeapPage::empty_page_data(64);
        image[0] = 0b0000_0001;
        let header = header_size(slots_per_page(64, 1));
        image[header] = 9;
        let result = HeapPage::new(PageId::new(1, 0), image, schema);
        assert!(matches!(result, Err(StorageError::CorruptPage { .. })));
    }

    #[test]
    fn test_tuple_wider_than_page() {
        let wide = Arc::new(Schema::from_pairs(&[("s", DataType::Varchar)]));
        let result = HeapPage::new(PageId::new(1, 0), HeapPage::empty_page_data(64), wide);
        assert!(matches!(result, Err(StorageError::SchemaMismatch(_))));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut page = empty_page(64);
        page.mark_dirty(Some(TransactionId::new(4)));
        assert_eq!(page.dirtied_by(), Some(TransactionId::new(4)));
        page.mark_dirty(None);
        assert!(!page.is_dirty());
    }
}
