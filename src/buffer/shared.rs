//! Shared pre-roll buffer handle
//!
//! Wraps a [`PreRollBuffer`] in a single async mutex so producers and
//! transport setup code on different tasks can use it concurrently. Every
//! operation holds the lock for its whole duration, so push (trim, insert
//! and fan-out), registration, deregistration and cap changes never
//! interleave.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::stats::BufferStats;

use super::config::{BufferConfig, SinkConfig};
use super::delivery::DeliveryReport;
use super::frame::StreamKey;
use super::preroll::PreRollBuffer;
use super::sink::{SinkId, SinkTransport};

/// Cloneable, lock-guarded handle to a [`PreRollBuffer`]
#[derive(Clone)]
pub struct SharedPreRollBuffer {
    inner: Arc<Mutex<PreRollBuffer>>,
}

impl SharedPreRollBuffer {
    /// Create a shared buffer with default configuration
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Create a shared buffer with custom configuration
    pub fn with_config(config: BufferConfig) -> Self {
        Self::from_buffer(PreRollBuffer::with_config(config))
    }

    /// Share an existing buffer
    pub fn from_buffer(buffer: PreRollBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Push a frame; resolves once trim, insert and fan-out are done
    pub async fn push_frame(
        &self,
        stream_key: impl Into<StreamKey>,
        data: &[u8],
        timestamp: i64,
    ) -> DeliveryReport {
        self.inner.lock().await.push_frame(stream_key, data, timestamp)
    }

    /// Run a delivery pass without pushing
    pub async fn flush(&self) -> DeliveryReport {
        self.inner.lock().await.flush()
    }

    /// Register (or re-register) a sink at the current buffer time
    pub async fn register_sink<T, I, K>(
        &self,
        id: SinkId,
        transport: &Arc<T>,
        interest: I,
        config: SinkConfig,
    ) where
        T: SinkTransport + 'static,
        I: IntoIterator<Item = K>,
        K: Into<StreamKey>,
    {
        self.inner
            .lock()
            .await
            .register_sink(id, transport, interest, config);
    }

    /// Register (or re-register) a sink with an explicit registration time
    pub async fn register_sink_at<T, I, K>(
        &self,
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
        self.inner
            .lock()
            .await
            .register_sink_at(id, transport, interest, config, registered_at_ms);
    }

    /// Remove a sink
    pub async fn deregister_sink(&self, id: SinkId) -> bool {
        self.inner.lock().await.deregister_sink(id)
    }

    /// Change the byte cap and trim immediately
    pub async fn set_max_total_bytes(&self, max_total_bytes: usize) -> usize {
        self.inner.lock().await.set_max_total_bytes(max_total_bytes)
    }

    /// Drop every retained frame
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    /// Current time on the buffer clock
    pub async fn now_ms(&self) -> i64 {
        self.inner.lock().await.now_ms()
    }

    /// Payload bytes currently retained
    pub async fn total_bytes(&self) -> usize {
        self.inner.lock().await.total_bytes()
    }

    /// Whether `id` is registered
    pub async fn is_registered(&self, id: SinkId) -> bool {
        self.inner.lock().await.is_registered(id)
    }

    /// Snapshot of buffer statistics
    pub async fn stats(&self) -> BufferStats {
        self.inner.lock().await.stats()
    }

    /// Run `f` with exclusive access to the underlying buffer
    pub async fn with_buffer<R>(&self, f: impl FnOnce(&mut PreRollBuffer) -> R) -> R {
        let mut buffer = self.inner.lock().await;
        f(&mut buffer)
    }
}

impl Default for SharedPreRollBuffer {
    fn default() -> Self {
        Self::new()
    }
}
