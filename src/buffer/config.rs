//! Buffer and sink configuration

/// Default byte cap
///
/// This is a placeholder sized for tests, not real media. Callers should
/// raise it to cover their pre-roll window at the actual bitrate.
pub const DEFAULT_MAX_TOTAL_BYTES: usize = 4096;

/// Buffer configuration options
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Soft cap on total retained payload bytes across all streams
    pub max_total_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

impl BufferConfig {
    /// Set the byte cap
    pub fn max_total_bytes(mut self, bytes: usize) -> Self {
        self.max_total_bytes = bytes;
        self
    }
}

/// Per-sink pre-roll options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkConfig {
    /// Requested history window in ms (0 = use the keyframe interval)
    pub pre_buffer_ms: i64,

    /// Keyframe interval hint in ms
    pub keyframe_interval_ms: i64,
}

impl SinkConfig {
    /// Create a config with explicit window and keyframe interval
    pub fn new(pre_buffer_ms: i64, keyframe_interval_ms: i64) -> Self {
        Self {
            pre_buffer_ms,
            keyframe_interval_ms,
        }
    }

    /// Set the requested pre-buffer window
    pub fn pre_buffer_ms(mut self, ms: i64) -> Self {
        self.pre_buffer_ms = ms;
        self
    }

    /// Set the keyframe interval hint
    pub fn keyframe_interval_ms(mut self, ms: i64) -> Self {
        self.keyframe_interval_ms = ms;
        self
    }

    /// Effective lookback for the first delivery pass
    pub fn lookback_ms(&self) -> i64 {
        if self.pre_buffer_ms != 0 {
            self.pre_buffer_ms
        } else {
            self.keyframe_interval_ms
        }
    }
}
