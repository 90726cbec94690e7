// FINISHLINE Frame Cache
// Copyright (c) 2026 Xing_The_Creator | FINISHLINE
//
// Bounded in-memory store of decoded and synthesized frames, keyed by the
// canonical identity key. Order reflects insertion/update recency only: a
// lookup never reorders the list, so a frame that is read often but never
// re-inserted can still age out. Linear scans are fine at this capacity.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use super::Frame;

/// Default maximum number of cached frames.
pub const DEFAULT_CAPACITY: usize = 32;

/// Capacity-bounded, deduplicated frame store. Not internally synchronized;
/// callers serialize access.
pub struct FrameCache {
    frames: VecDeque<Arc<Frame>>,
    capacity: usize,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a frame at head-of-recency. An existing entry with the same key
    /// is replaced wherever it sits; otherwise, at capacity, the oldest entry
    /// is silently dropped.
    pub fn add(&mut self, frame: Arc<Frame>) {
        if let Some(pos) = self.frames.iter().position(|f| f.key == frame.key) {
            let _ = self.frames.remove(pos);
        } else if self.frames.len() >= self.capacity {
            if let Some(evicted) = self.frames.pop_back() {
                debug!("[CACHE] Evicting oldest frame: {}", evicted.key);
            }
        }
        self.frames.push_front(frame);
    }

    /// Linear lookup by key. Never mutates ordering.
    pub fn get(&self, key: &str) -> Option<Arc<Frame>> {
        self.frames.iter().find(|f| f.key == key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.frames.iter().any(|f| f.key == key)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys in recency order, newest first. Used for diagnostics.
    pub fn keys(&self) -> Vec<&str> {
        self.frames.iter().map(|f| f.key.as_str()).collect()
    }
}
