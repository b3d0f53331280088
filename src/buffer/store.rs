//! Frame store
//!
//! Per-stream retention queues plus a running byte total. Frames are
//! appended at the tail of their stream's queue and only ever leave from
//! the front.

use std::collections::{BTreeMap, VecDeque};

use super::frame::{BufferedFrame, StreamKey};

/// Ordered frames for a single stream key
#[derive(Debug, Default)]
pub struct StreamQueue {
    frames: VecDeque<BufferedFrame>,
    bytes: usize,
}

impl StreamQueue {
    /// Oldest frame in the queue
    pub fn front(&self) -> Option<&BufferedFrame> {
        self.frames.front()
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &BufferedFrame> {
        self.frames.iter()
    }

    pub(super) fn iter_mut(&mut self) -> impl Iterator<Item = &mut BufferedFrame> {
        self.frames.iter_mut()
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the queue holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Payload bytes held by this queue
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Timestamps of the oldest and newest frames
    pub fn timestamp_range(&self) -> Option<(i64, i64)> {
        let first = self.frames.front()?.timestamp;
        let last = self.frames.back()?.timestamp;
        Some((first, last))
    }
}

/// All retained frames, keyed by stream
///
/// Streams iterate in `StreamKey` order. A queue is created the first time
/// its key is pushed and is kept (possibly empty) afterwards.
#[derive(Debug, Default)]
pub struct FrameStore {
    queues: BTreeMap<StreamKey, StreamQueue>,
    total_bytes: usize,
}

impl FrameStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `data` into a new frame at the tail of `stream_key`'s queue
    ///
    /// There is no size limit here; the byte cap is enforced by eviction.
    /// Returns the size of the stored frame.
    pub fn push(&mut self, stream_key: StreamKey, data: &[u8], timestamp: i64) -> usize {
        let frame = BufferedFrame::new(stream_key, data, timestamp);
        let size = frame.size();

        let queue = self.queues.entry(frame.stream_key.clone()).or_default();
        queue.frames.push_back(frame);
        queue.bytes += size;
        self.total_bytes += size;

        size
    }

    /// Key of the stream whose front frame is globally oldest
    ///
    /// Ties go to the key that sorts first.
    pub fn oldest_stream(&self) -> Option<&StreamKey> {
        let mut oldest: Option<(&StreamKey, i64)> = None;

        for (key, queue) in &self.queues {
            if let Some(front) = queue.front() {
                match oldest {
                    Some((_, ts)) if front.timestamp >= ts => {}
                    _ => oldest = Some((key, front.timestamp)),
                }
            }
        }

        oldest.map(|(key, _)| key)
    }

    /// Remove and return the front frame of `stream_key`
    pub fn pop_front(&mut self, stream_key: &StreamKey) -> Option<BufferedFrame> {
        let queue = self.queues.get_mut(stream_key)?;
        let frame = queue.frames.pop_front()?;
        queue.bytes -= frame.size();
        self.total_bytes -= frame.size();
        Some(frame)
    }

    /// Queue for a stream, if that key was ever pushed
    pub fn queue(&self, stream_key: &StreamKey) -> Option<&StreamQueue> {
        self.queues.get(stream_key)
    }

    pub(super) fn queue_mut(&mut self, stream_key: &StreamKey) -> Option<&mut StreamQueue> {
        self.queues.get_mut(stream_key)
    }

    /// Iterate all queues in key order
    pub fn queues(&self) -> impl Iterator<Item = (&StreamKey, &StreamQueue)> {
        self.queues.iter()
    }

    /// Total payload bytes retained
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Total frames retained
    pub fn frame_count(&self) -> usize {
        self.queues.values().map(StreamQueue::len).sum()
    }

    /// Drop every retained frame, keeping the (now empty) queues
    pub fn clear(&mut self) {
        for queue in self.queues.values_mut() {
            queue.frames.clear();
            queue.bytes = 0;
        }
        self.total_bytes = 0;
    }
}
