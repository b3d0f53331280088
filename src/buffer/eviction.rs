//! Eviction of the globally-oldest frames
//!
//! Eviction ignores delivery status: a frame can be dropped before every
//! interested sink has received it.

use super::store::FrameStore;

/// Enforces the byte cap on a [`FrameStore`]
#[derive(Debug, Default)]
pub struct EvictionController {
    evicted_frames: u64,
    evicted_bytes: u64,
}

impl EvictionController {
    /// Create a controller with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict oldest frames until the store is within `cap`
    ///
    /// Returns the number of frames evicted.
    pub fn trim(&mut self, store: &mut FrameStore, cap: usize) -> usize {
        self.evict_while(store, |total| total > cap)
    }

    /// Evict oldest frames until `incoming` more bytes fit within `cap`
    ///
    /// If `incoming` alone exceeds `cap`, everything is evicted.
    pub fn make_room(&mut self, store: &mut FrameStore, cap: usize, incoming: usize) -> usize {
        self.evict_while(store, |total| total.saturating_add(incoming) > cap)
    }

    fn evict_while(&mut self, store: &mut FrameStore, over: impl Fn(usize) -> bool) -> usize {
        let mut evicted = 0;

        while over(store.total_bytes()) {
            let Some(key) = store.oldest_stream().cloned() else {
                break;
            };
            let Some(frame) = store.pop_front(&key) else {
                break;
            };

            tracing::debug!(
                stream = %key,
                timestamp = frame.timestamp,
                size = frame.size(),
                delivered_to = frame.delivery_count(),
                total_bytes = store.total_bytes(),
                "Evicted frame"
            );

            evicted += 1;
            self.evicted_frames += 1;
            self.evicted_bytes += frame.size() as u64;
        }

        evicted
    }

    /// Frames evicted since creation
    pub fn evicted_frames(&self) -> u64 {
        self.evicted_frames
    }

    /// Bytes evicted since creation
    pub fn evicted_bytes(&self) -> u64 {
        self.evicted_bytes
    }
}
