use crate::FrameId;

/// Replacer tracks frame usage and picks a victim when the buffer pool runs out of free frames.
///
/// It only ever tracks frames whose pin count is zero and that are not on the free list.
/// Implementations serialize internally and never perform I/O.
pub trait Replacer: Send + Sync {
    /// Record that `frame_id` was accessed at the current logical time.
    fn record_access(&self, frame_id: FrameId);
    /// Remove and return the victim according to the policy, `None` if nothing is evictable.
    fn evict(&self) -> Option<FrameId>;
    /// The frame is in use and must not be evicted. Idempotent.
    fn pin(&self, frame_id: FrameId);
    /// The frame's pin count dropped to zero, it may be evicted. Idempotent.
    fn unpin(&self, frame_id: FrameId);
    /// Forget the frame together with its access history.
    fn remove(&self, frame_id: FrameId);
    /// Number of evictable frames.
    fn size(&self) -> usize;
}
