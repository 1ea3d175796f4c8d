use crate::buffer::replacer::Replacer;
use crate::FrameId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct LruKNode {
    /// The last (at most) K access timestamps, oldest in front.
    history: VecDeque<u64>,
    is_evictable: bool,
}

impl LruKNode {
    fn new(k: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(k),
            is_evictable: false,
        }
    }

    fn record_access(&mut self, k: usize, timestamp: u64) {
        if self.history.len() == k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp);
    }

    /// Smaller sorts first, i.e. is evicted first.
    ///
    /// Frames with fewer than K accesses have an infinite backward k-distance, so they always
    /// come before the rest; among them the earliest recorded access decides. For frames with
    /// a full history the front is exactly the K-th most recent access.
    fn eviction_key(&self, k: usize) -> (bool, u64) {
        let oldest = self.history.front().copied().unwrap_or(0);
        (self.history.len() >= k, oldest)
    }
}

struct LruKState {
    nodes: HashMap<FrameId, LruKNode>,
    current_timestamp: u64,
    evictable: usize,
}

/// LruKReplacer implements the LRU-K replacement policy.
///
/// The victim is the evictable frame whose backward k-distance (now minus the timestamp of its
/// K-th most recent access) is the largest.
pub struct LruKReplacer {
    k: usize,
    replacer_size: usize,
    inner: Mutex<LruKState>,
}

impl LruKReplacer {
    pub fn new(k: usize, num_frames: usize) -> Self {
        assert!(k > 0, "replacer k should be larger than zero");
        Self {
            k,
            replacer_size: num_frames,
            inner: Mutex::new(LruKState {
                nodes: HashMap::with_capacity(num_frames),
                current_timestamp: 0,
                evictable: 0,
            }),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn state(&self) -> MutexGuard<'_, LruKState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Replacer for LruKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        if frame_id.0 >= self.replacer_size {
            return;
        }
        let k = self.k;
        let mut state = self.state();
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;
        state
            .nodes
            .entry(frame_id)
            .or_insert_with(|| LruKNode::new(k))
            .record_access(k, timestamp);
    }

    fn evict(&self) -> Option<FrameId> {
        let k = self.k;
        let mut state = self.state();
        let victim = state
            .nodes
            .iter()
            .filter(|(_, node)| node.is_evictable)
            .min_by_key(|(frame_id, node)| (node.eviction_key(k), **frame_id))
            .map(|(frame_id, _)| *frame_id)?;

        state.nodes.remove(&victim);
        state.evictable -= 1;
        Some(victim)
    }

    fn pin(&self, frame_id: FrameId) {
        let mut state = self.state();
        let was_evictable = match state.nodes.get_mut(&frame_id) {
            Some(node) if node.is_evictable => {
                node.is_evictable = false;
                true
            }
            _ => false,
        };
        if was_evictable {
            state.evictable -= 1;
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        if frame_id.0 >= self.replacer_size {
            return;
        }
        let k = self.k;
        let mut guard = self.state();
        let state = &mut *guard;
        let node = state
            .nodes
            .entry(frame_id)
            .or_insert_with(|| LruKNode::new(k));
        if !node.is_evictable {
            node.is_evictable = true;
            state.evictable += 1;
        }
    }

    fn remove(&self, frame_id: FrameId) {
        let mut state = self.state();
        if let Some(node) = state.nodes.remove(&frame_id) {
            if node.is_evictable {
                state.evictable -= 1;
            }
        }
    }

    fn size(&self) -> usize {
        self.state().evictable
    }
}
