//! Statistics for the pre-roll buffer

use std::time::Duration;

use crate::buffer::StreamKey;

/// Per-stream retention statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamQueueStats {
    /// Stream key
    pub stream_key: StreamKey,
    /// Frames currently retained
    pub frames: usize,
    /// Payload bytes currently retained
    pub bytes: usize,
    /// Oldest retained timestamp
    pub oldest_ts: Option<i64>,
    /// Newest retained timestamp
    pub newest_ts: Option<i64>,
}

impl StreamQueueStats {
    /// Time span covered by the retained frames in ms
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.oldest_ts, self.newest_ts) {
            (Some(oldest), Some(newest)) => Some(newest.saturating_sub(oldest)),
            _ => None,
        }
    }
}

/// Buffer-wide statistics
#[derive(Debug, Clone, Default)]
pub struct BufferStats {
    /// Payload bytes currently retained
    pub total_bytes: usize,
    /// Configured byte cap
    pub max_total_bytes: usize,
    /// Frames currently retained
    pub frame_count: usize,
    /// Registered sinks
    pub sink_count: usize,
    /// Frames pushed since creation
    pub frames_pushed: u64,
    /// Frames evicted since creation
    pub frames_evicted: u64,
    /// Bytes evicted since creation
    pub bytes_evicted: u64,
    /// Frame deliveries since creation
    pub frames_delivered: u64,
    /// Time since the buffer was created
    pub uptime: Duration,
    /// Per-stream breakdown, in stream key order
    pub streams: Vec<StreamQueueStats>,
}

impl BufferStats {
    /// Retained bytes as a percentage of the cap
    pub fn utilization(&self) -> f32 {
        if self.max_total_bytes > 0 {
            (self.total_bytes as f32 / self.max_total_bytes as f32) * 100.0
        } else {
            0.0
        }
    }

    /// Whether retained bytes exceed the cap
    pub fn over_cap(&self) -> bool {
        self.total_bytes > self.max_total_bytes
    }

    /// Stats for one stream
    pub fn stream(&self, stream_key: &StreamKey) -> Option<&StreamQueueStats> {
        self.streams.iter().find(|s| &s.stream_key == stream_key)
    }
}
