use crate::buffer::replacer::Replacer;
use crate::FrameId;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Evicts the frame that became evictable least recently.
///
/// Every evictable frame holds exactly one stamp, taken when it was unpinned. `queue` orders the
/// frames by stamp and `recorder` finds a frame's stamp, so both stay as large as the number of
/// evictable frames.
pub struct LruReplacer {
    inner: Mutex<LruState>,
}

struct LruState {
    queue: BTreeMap<u64, FrameId>,
    recorder: HashMap<FrameId, u64>,
    stamp: u64,
}

impl LruReplacer {
    pub fn new(num_pages: usize) -> Self {
        Self {
            inner: Mutex::new(LruState {
                queue: BTreeMap::new(),
                recorder: HashMap::with_capacity(num_pages),
                stamp: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LruState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Replacer for LruReplacer {
    // Recency is the moment a frame is unpinned; every access pins first.
    fn record_access(&self, _frame_id: FrameId) {}

    fn evict(&self) -> Option<FrameId> {
        let mut state = self.state();
        let (&stamp, &frame_id) = state.queue.iter().next()?;
        state.queue.remove(&stamp);
        state.recorder.remove(&frame_id);
        Some(frame_id)
    }

    fn pin(&self, frame_id: FrameId) {
        let mut state = self.state();
        if let Some(stamp) = state.recorder.remove(&frame_id) {
            state.queue.remove(&stamp);
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut state = self.state();
        if state.recorder.contains_key(&frame_id) {
            return;
        }
        let stamp = state.stamp;
        state.stamp += 1;
        state.recorder.insert(frame_id, stamp);
        state.queue.insert(stamp, frame_id);
    }

    fn remove(&self, frame_id: FrameId) {
        self.pin(frame_id)
    }

    fn size(&self) -> usize {
        self.state().recorder.len()
    }
}
