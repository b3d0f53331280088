//! Pre-roll buffer
//!
//! Composes the frame store, sink registry, eviction and delivery into the
//! operations a producer and its transports use. This type is not
//! synchronized; see [`SharedPreRollBuffer`](super::SharedPreRollBuffer)
//! for the lock-guarded handle.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::Instant;

use crate::stats::{BufferStats, StreamQueueStats};

use super::config::{BufferConfig, SinkConfig};
use super::delivery::{DeliveryEngine, DeliveryReport};
use super::eviction::EvictionController;
use super::frame::StreamKey;
use super::sink::{SinkId, SinkRegistry, SinkTransport};
use super::store::FrameStore;

/// Bounded multi-subscriber frame buffer
pub struct PreRollBuffer {
    config: BufferConfig,
    store: FrameStore,
    sinks: SinkRegistry,
    eviction: EvictionController,
    delivery: DeliveryEngine,
    frames_pushed: u64,
    created_at: Instant,
}

impl PreRollBuffer {
    /// Create a buffer with the default (placeholder) byte cap
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Create a buffer with custom configuration
    pub fn with_config(config: BufferConfig) -> Self {
        Self {
            config,
            store: FrameStore::new(),
            sinks: SinkRegistry::new(),
            eviction: EvictionController::new(),
            delivery: DeliveryEngine::new(),
            frames_pushed: 0,
            created_at: Instant::now(),
        }
    }

    /// Get the buffer configuration
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Milliseconds on the buffer's monotonic clock
    ///
    /// Registration times are stamped from this clock, so producers should
    /// timestamp frames against it as well.
    pub fn now_ms(&self) -> i64 {
        i64::try_from(self.created_at.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    /// Retain a copy of `data` and fan it out to every interested sink
    ///
    /// Older frames are evicted first so the new frame fits under the cap.
    /// A frame larger than the cap on its own is still accepted.
    pub fn push_frame(
        &mut self,
        stream_key: impl Into<StreamKey>,
        data: &[u8],
        timestamp: i64,
    ) -> DeliveryReport {
        let stream_key = stream_key.into();
        let cap = self.config.max_total_bytes;

        self.eviction.make_room(&mut self.store, cap, data.len());
        if data.len() > cap {
            tracing::debug!(
                stream = %stream_key,
                size = data.len(),
                max_total_bytes = cap,
                "Frame exceeds byte cap on its own"
            );
        }

        self.store.push(stream_key, data, timestamp);
        self.frames_pushed += 1;

        self.delivery.run_pass(&mut self.store, &mut self.sinks)
    }

    /// Run a delivery pass without pushing a frame
    ///
    /// Lets a freshly registered sink receive its pre-roll before the next
    /// frame arrives.
    pub fn flush(&mut self) -> DeliveryReport {
        self.delivery.run_pass(&mut self.store, &mut self.sinks)
    }

    /// Register (or re-register) a sink, stamping the buffer clock
    pub fn register_sink<T, I, K>(
        &mut self,
        id: SinkId,
        transport: &Arc<T>,
        interest: I,
        config: SinkConfig,
    ) where
        T: SinkTransport + 'static,
        I: IntoIterator<Item = K>,
        K: Into<StreamKey>,
    {
        let now_ms = self.now_ms();
        self.register_sink_at(id, transport, interest, config, now_ms);
    }

    /// Register (or re-register) a sink with an explicit registration time
    ///
    /// Re-registering replaces the interest set and resets the pre-roll
    /// state. Frames already delivered to `id` are not sent again.
    pub fn register_sink_at<T, I, K>(
        &mut self,
        id: SinkId,
        transport: &Arc<T>,
        interest: I,
        config: SinkConfig,
        registered_at_ms: i64,
    ) where
        T: SinkTransport + 'static,
        I: IntoIterator<Item = K>,
        K: Into<StreamKey>,
    {
        let transport: Weak<T> = Arc::downgrade(transport);
        let interest: BTreeSet<StreamKey> = interest.into_iter().map(Into::into).collect();
        let streams = interest.len();

        let replaced = self.sinks.register(id, transport, interest, config, registered_at_ms);

        tracing::info!(
            sink = %id,
            streams = streams,
            registered_at_ms = registered_at_ms,
            pre_buffer_ms = config.pre_buffer_ms,
            keyframe_interval_ms = config.keyframe_interval_ms,
            replaced = replaced,
            "Sink registered"
        );
    }

    /// Remove a sink; returns whether it was registered
    pub fn deregister_sink(&mut self, id: SinkId) -> bool {
        let removed = self.sinks.deregister(id);
        tracing::info!(sink = %id, removed = removed, "Sink deregistered");
        removed
    }

    /// Change the byte cap and trim immediately
    ///
    /// Returns the number of frames evicted.
    pub fn set_max_total_bytes(&mut self, max_total_bytes: usize) -> usize {
        tracing::info!(max_total_bytes = max_total_bytes, "Setting max total bytes");
        self.config.max_total_bytes = max_total_bytes;
        self.eviction.trim(&mut self.store, max_total_bytes)
    }

    /// Drop every retained frame, keeping registered sinks
    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Current byte cap
    pub fn max_total_bytes(&self) -> usize {
        self.config.max_total_bytes
    }

    /// Payload bytes currently retained
    pub fn total_bytes(&self) -> usize {
        self.store.total_bytes()
    }

    /// Frames currently retained
    pub fn frame_count(&self) -> usize {
        self.store.frame_count()
    }

    /// Number of registered sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Whether `id` is registered
    pub fn is_registered(&self, id: SinkId) -> bool {
        self.sinks.contains(id)
    }

    /// Whether `id` has received at least one frame since it registered
    pub fn has_delivered_first_frame(&self, id: SinkId) -> Option<bool> {
        self.sinks.get(id).map(|s| s.has_delivered_first_frame)
    }

    /// Read access to retained frames
    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Read access to registered sinks
    pub fn sinks(&self) -> &SinkRegistry {
        &self.sinks
    }

    /// Snapshot of buffer statistics
    pub fn stats(&self) -> BufferStats {
        let streams = self
            .store
            .queues()
            .map(|(key, queue)| {
                let range = queue.timestamp_range();
                StreamQueueStats {
                    stream_key: key.clone(),
                    frames: queue.len(),
                    bytes: queue.bytes(),
                    oldest_ts: range.map(|(first, _)| first),
                    newest_ts: range.map(|(_, last)| last),
                }
            })
            .collect();

        BufferStats {
            total_bytes: self.store.total_bytes(),
            max_total_bytes: self.config.max_total_bytes,
            frame_count: self.store.frame_count(),
            sink_count: self.sinks.len(),
            frames_pushed: self.frames_pushed,
            frames_evicted: self.eviction.evicted_frames(),
            bytes_evicted: self.eviction.evicted_bytes(),
            frames_delivered: self.delivery.delivered_frames(),
            uptime: self.created_at.elapsed(),
            streams,
        }
    }
}

impl Default for PreRollBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;

    #[derive(Default)]
    struct MockTransport {
        audio: bool,
        video: bool,
        sent: Mutex<Vec<(StreamKey, i64)>>,
    }

    impl MockTransport {
        fn av() -> Arc<Self> {
            Arc::new(Self {
                audio: true,
                video: true,
                ..Default::default()
            })
        }

        fn video_only() -> Arc<Self> {
            Arc::new(Self {
                video: true,
                ..Default::default()
            })
        }

        fn timestamps(&self) -> Vec<i64> {
            self.sent.lock().unwrap().iter().map(|(_, ts)| *ts).collect()
        }
    }

    impl SinkTransport for MockTransport {
        fn can_send_audio(&self) -> bool {
            self.audio
        }
        fn can_send_video(&self) -> bool {
            self.video
        }
        fn send_audio(&self, _data: Bytes, timestamp: i64, track: u16) {
            self.sent.lock().unwrap().push((StreamKey::audio(track), timestamp));
        }
        fn send_video(&self, _data: Bytes, timestamp: i64, track: u16) {
            self.sent.lock().unwrap().push((StreamKey::video(track), timestamp));
        }
    }

    fn stored_bytes(buffer: &PreRollBuffer) -> usize {
        buffer
            .store()
            .queues()
            .flat_map(|(_, q)| q.iter())
            .map(|f| f.size())
            .sum()
    }

    #[test]
    fn test_default_cap() {
        let buffer = PreRollBuffer::new();
        assert_eq!(buffer.max_total_bytes(), 4096);
        assert_eq!(buffer.total_bytes(), 0);
    }

    #[test]
    fn test_push_evicts_oldest_over_cap() {
        let mut buffer = PreRollBuffer::with_config(BufferConfig::default().max_total_bytes(1000));

        for ts in [100, 200, 300] {
            buffer.push_frame("v0", &[0u8; 400], ts);
        }

        assert_eq!(buffer.total_bytes(), 800);
        let queue = buffer.store().queue(&StreamKey::video(0)).unwrap();
        let timestamps: Vec<i64> = queue.iter().map(|f| f.timestamp).collect();
        assert_eq!(timestamps, vec![200, 300]);
        assert_eq!(buffer.stats().frames_evicted, 1);
    }

    #[test]
    fn test_total_bytes_matches_frames() {
        let mut buffer = PreRollBuffer::with_config(BufferConfig::default().max_total_bytes(1000));

        for i in 0..20 {
            let key = if i % 3 == 0 { "a0" } else { "v0" };
            buffer.push_frame(key, &vec![0u8; 37 * (i + 1)], i as i64 * 10);
            assert_eq!(buffer.total_bytes(), stored_bytes(&buffer));
            assert!(buffer.total_bytes() <= 1000);
        }
    }

    #[test]
    fn test_oversized_frame_accepted() {
        let mut buffer = PreRollBuffer::with_config(BufferConfig::default().max_total_bytes(100));
        buffer.push_frame("v0", &[0u8; 50], 1);
        buffer.push_frame("a0", &[0u8; 40], 2);

        buffer.push_frame("v0", &[0u8; 500], 3);

        assert_eq!(buffer.total_bytes(), 500);
        assert_eq!(buffer.frame_count(), 1);
        assert!(buffer.stats().over_cap());

        // Next push evicts it
        buffer.push_frame("v0", &[0u8; 10], 4);
        assert_eq!(buffer.total_bytes(), 10);
    }

    #[test]
    fn test_oversized_frame_still_delivered() {
        let mut buffer = PreRollBuffer::with_config(BufferConfig::default().max_total_bytes(100));
        let transport = MockTransport::video_only();
        buffer.register_sink_at(SinkId::new(1), &transport, ["v0"], SinkConfig::default(), 0);

        let report = buffer.push_frame("v0", &[0u8; 500], 10);

        assert_eq!(report.delivered, 1);
        assert_eq!(transport.timestamps(), vec![10]);
    }

    #[test]
    fn test_set_max_total_bytes_trims() {
        let mut buffer = PreRollBuffer::with_config(BufferConfig::default().max_total_bytes(1000));
        buffer.push_frame("v0", &[0u8; 300], 100);
        buffer.push_frame("a0", &[0u8; 300], 150);
        buffer.push_frame("v0", &[0u8; 300], 200);

        assert_eq!(buffer.set_max_total_bytes(500), 2);
        assert_eq!(buffer.max_total_bytes(), 500);
        assert_eq!(buffer.total_bytes(), 300);
        let queue = buffer.store().queue(&StreamKey::video(0)).unwrap();
        assert_eq!(queue.front().unwrap().timestamp, 200);
    }

    #[test]
    fn test_preroll_on_registration() {
        let config = BufferConfig::default().max_total_bytes(10_000);
        let mut buffer = PreRollBuffer::with_config(config);
        for ts in [100, 200, 300] {
            buffer.push_frame("v0", &[0u8; 10], ts);
        }

        let transport = MockTransport::video_only();
        let id = SinkId::new(1);
        buffer.register_sink_at(id, &transport, ["v0"], SinkConfig::new(0, 150), 250);
        assert_eq!(buffer.has_delivered_first_frame(id), Some(false));

        let report = buffer.flush();

        assert_eq!(report.delivered, 3);
        assert_eq!(transport.timestamps(), vec![100, 200, 300]);
        assert_eq!(buffer.has_delivered_first_frame(id), Some(true));
    }

    #[test]
    fn test_preroll_window_excludes_older_frames() {
        let config = BufferConfig::default().max_total_bytes(10_000);
        let mut buffer = PreRollBuffer::with_config(config);
        for ts in [0, 100, 200, 300, 400] {
            buffer.push_frame("v0", &[0u8; 10], ts);
        }

        let transport = MockTransport::video_only();
        let config = SinkConfig::new(200, 5000);
        buffer.register_sink_at(SinkId::new(1), &transport, ["v0"], config, 400);

        // The next push triggers the first pass
        buffer.push_frame("v0", &[0u8; 10], 500);

        assert_eq!(transport.timestamps(), vec![200, 300, 400, 500]);
    }

    #[test]
    fn test_reregistration_resets_preroll() {
        let config = BufferConfig::default().max_total_bytes(10_000);
        let mut buffer = PreRollBuffer::with_config(config);
        let transport = MockTransport::av();
        let id = SinkId::new(9);

        buffer.register_sink_at(id, &transport, ["v0"], SinkConfig::default(), 0);
        buffer.push_frame("a0", &[0u8; 10], 50);
        buffer.push_frame("v0", &[0u8; 10], 100);
        assert_eq!(transport.timestamps(), vec![100]);
        assert_eq!(buffer.has_delivered_first_frame(id), Some(true));

        // Switch interest to audio: new pre-roll burst back to 0
        buffer.register_sink_at(id, &transport, ["a0", "v0"], SinkConfig::new(200, 0), 200);
        assert_eq!(buffer.has_delivered_first_frame(id), Some(false));

        buffer.flush();

        // a0@50 arrives; v0@100 is not sent twice
        assert_eq!(transport.timestamps(), vec![100, 50]);
        assert_eq!(buffer.has_delivered_first_frame(id), Some(true));
    }

    #[test]
    fn test_allocated_sink_id_does_not_replace_chosen_id() {
        let mut buffer = PreRollBuffer::new();
        let first = MockTransport::video_only();
        let second = MockTransport::video_only();
        let chosen = SinkId::new(1);
        let allocated = SinkId::next();

        buffer.register_sink_at(chosen, &first, ["v0"], SinkConfig::default(), 0);
        buffer.register_sink_at(allocated, &second, ["v0"], SinkConfig::default(), 0);
        assert_eq!(buffer.sink_count(), 2);

        buffer.push_frame("v0", &[0u8; 10], 5);

        assert_eq!(first.timestamps(), vec![5]);
        assert_eq!(second.timestamps(), vec![5]);
        let queue = buffer.store().queue(&StreamKey::video(0)).unwrap();
        let frame = queue.front().unwrap();
        assert_eq!(frame.delivery_count(), 2);
    }

    #[test]
    fn test_capability_mismatch_keeps_sink() {
        let config = BufferConfig::default().max_total_bytes(10_000);
        let mut buffer = PreRollBuffer::with_config(config);
        let transport = MockTransport::video_only();
        let id = SinkId::new(1);
        buffer.register_sink_at(id, &transport, ["a0"], SinkConfig::default(), 0);

        for ts in 0..5 {
            let report = buffer.push_frame("a0", &[0u8; 10], ts);
            assert_eq!(report.delivered, 0);
        }

        assert!(transport.timestamps().is_empty());
        assert!(buffer.is_registered(id));
    }

    #[test]
    fn test_dropped_transport_removed_lazily() {
        let mut buffer = PreRollBuffer::new();
        let transport = MockTransport::av();
        let id = SinkId::new(1);
        buffer.register_sink_at(id, &transport, ["v0"], SinkConfig::default(), 0);

        drop(transport);
        assert!(buffer.is_registered(id));

        let report = buffer.push_frame("v0", &[0u8; 10], 0);
        assert_eq!(report.removed_sinks, vec![id]);
        assert!(!buffer.is_registered(id));
    }

    #[test]
    fn test_deregister() {
        let mut buffer = PreRollBuffer::new();
        let transport = MockTransport::av();
        let id = SinkId::new(1);
        buffer.register_sink(id, &transport, ["v0"], SinkConfig::default());

        assert!(buffer.deregister_sink(id));
        assert!(!buffer.deregister_sink(id));

        buffer.push_frame("v0", &[0u8; 10], buffer.now_ms());
        assert!(transport.timestamps().is_empty());
    }

    #[test]
    fn test_eviction_ignores_delivery_status() {
        let mut buffer = PreRollBuffer::with_config(BufferConfig::default().max_total_bytes(20));
        let transport = MockTransport::av();
        buffer.register_sink_at(SinkId::new(1), &transport, ["a0"], SinkConfig::default(), 1_000);

        // Below the sink's cutoff, never delivered, still evicted
        buffer.push_frame("a0", &[0u8; 10], 10);
        buffer.push_frame("a0", &[0u8; 10], 20);
        buffer.push_frame("a0", &[0u8; 10], 30);

        assert!(transport.timestamps().is_empty());
        let queue = buffer.store().queue(&StreamKey::audio(0)).unwrap();
        let timestamps: Vec<i64> = queue.iter().map(|f| f.timestamp).collect();
        assert_eq!(timestamps, vec![20, 30]);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut buffer = PreRollBuffer::with_config(BufferConfig::default().max_total_bytes(1000));
        let transport = MockTransport::av();
        buffer.register_sink_at(SinkId::new(1), &transport, ["a0", "v0"], SinkConfig::default(), 0);

        buffer.push_frame("v0", &[0u8; 100], 0);
        buffer.push_frame("a0", &[0u8; 20], 10);
        buffer.push_frame("v0", &[0u8; 100], 33);

        let stats = buffer.stats();
        assert_eq!(stats.total_bytes, 220);
        assert_eq!(stats.frame_count, 3);
        assert_eq!(stats.sink_count, 1);
        assert_eq!(stats.frames_pushed, 3);
        assert_eq!(stats.frames_delivered, 3);
        assert_eq!(stats.streams.len(), 2);

        let video = stats.stream(&StreamKey::video(0)).unwrap();
        assert_eq!(video.frames, 2);
        assert_eq!(video.bytes, 200);
        assert_eq!(video.duration_ms(), Some(33));
    }

    #[test]
    fn test_clear_keeps_sinks() {
        let mut buffer = PreRollBuffer::new();
        let transport = MockTransport::av();
        buffer.register_sink_at(SinkId::new(1), &transport, ["v0"], SinkConfig::default(), 0);
        buffer.push_frame("v0", &[0u8; 10], 0);

        buffer.clear();

        assert_eq!(buffer.total_bytes(), 0);
        assert_eq!(buffer.frame_count(), 0);
        assert_eq!(buffer.sink_count(), 1);
    }
}
