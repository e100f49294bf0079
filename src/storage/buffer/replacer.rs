use std::fmt::Debug;

pub type FrameId = usize;

/// Victim selection policy for the buffer pool.
///
/// The replacer only tracks recency. Whether a frame may be evicted right now
/// (it must hold a clean page) is decided by the buffer pool and passed in.
pub trait Replacer: Send + Debug {
    /// Record that the page in a frame was just accessed.
    fn record_access(&mut self, frame_id: FrameId);

    /// Forget a frame whose page left the pool.
    fn remove(&mut self, frame_id: FrameId);

    /// Select and forget a frame to evict among those for which `evictable`
    /// holds. Returns None if no tracked frame qualifies.
    fn victim(&mut self, evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId>;

    /// Get the number of tracked frames.
    fn size(&self) -> usize;
}
