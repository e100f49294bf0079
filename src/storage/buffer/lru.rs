use super::replacer::{FrameId, Replacer};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct LruReplacer {
    /// Tracked frames, least recently used at front
    lru_list: VecDeque<FrameId>,
}

impl LruReplacer {
    pub fn new(max_size: usize) -> Self {
        Self {
            lru_list: VecDeque::with_capacity(max_size),
        }
    }

    fn position(&self, frame_id: FrameId) -> Option<usize> {
        self.lru_list.iter().position(|&f| f == frame_id)
    }
}

impl Replacer for LruReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        if let Some(idx) = self.position(frame_id) {
            self.lru_list.remove(idx);
        }
        self.lru_list.push_back(frame_id);
    }

    fn remove(&mut self, frame_id: FrameId) {
        if let Some(idx) = self.position(frame_id) {
            self.lru_list.remove(idx);
        }
    }

    fn victim(&mut self, evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let idx = self.lru_list.iter().position(|&f| evictable(f))?;
        self.lru_list.remove(idx)
    }

    fn size(&self) -> usize {
        self.lru_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any(_: FrameId) -> bool {
        true
    }

    #[test]
    fn test_basic_lru_order() {
        let mut replacer = LruReplacer::new(3);

        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.victim(&any), None);

        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(3);
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.victim(&any), Some(1));
        assert_eq!(replacer.victim(&any), Some(2));
        assert_eq!(replacer.victim(&any), Some(3));
        assert_eq!(replacer.victim(&any), None);
    }

    #[test]
    fn test_access_refreshes_recency() {
        let mut replacer = LruReplacer::new(3);
        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(1);

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(&any), Some(2));
        assert_eq!(replacer.victim(&any), Some(1));
    }

    #[test]
    fn test_victim_skips_unevictable() {
        let mut replacer = LruReplacer::new(3);
        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(3);

        let not_one = |f: FrameId| f != 1;
        assert_eq!(replacer.victim(&not_one), Some(2));
        assert_eq!(replacer.size(), 2);

        let nothing = |_: FrameId| false;
        assert_eq!(replacer.victim(&nothing), None);
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_remove() {
        let mut replacer = LruReplacer::new(2);
        replacer.record_access(1);
        replacer.record_access(2);

        replacer.remove(1);
        replacer.remove(999);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.victim(&any), Some(2));
    }
}
