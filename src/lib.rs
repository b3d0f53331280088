//! Bounded pre-roll frame buffer for live audio/video fan-out
//!
//! A live producer pushes captured frames into a [`PreRollBuffer`]; every
//! registered sink receives each frame on its interested streams exactly
//! once, and sinks that join late first get a window of recent history.
//! Memory is bounded by evicting the globally-oldest frames, never by
//! rejecting pushes.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use preroll_buffer::{BufferConfig, PreRollBuffer, SinkConfig, SinkId, SinkTransport};
//!
//! struct Printer;
//!
//! impl SinkTransport for Printer {
//!     fn can_send_audio(&self) -> bool { true }
//!     fn can_send_video(&self) -> bool { true }
//!     fn send_audio(&self, data: Bytes, ts: i64, track: u16) {
//!         println!("audio track {} @ {}ms: {} bytes", track, ts, data.len());
//!     }
//!     fn send_video(&self, data: Bytes, ts: i64, track: u16) {
//!         println!("video track {} @ {}ms: {} bytes", track, ts, data.len());
//!     }
//! }
//!
//! let mut buffer = PreRollBuffer::with_config(BufferConfig::default().max_total_bytes(1 << 20));
//! buffer.push_frame("v0", &[0u8; 1200], 0);
//! buffer.push_frame("v0", &[0u8; 300], 33);
//!
//! let transport = Arc::new(Printer);
//! buffer.register_sink_at(SinkId::next(), &transport, ["v0"], SinkConfig::new(0, 1000), 33);
//!
//! let report = buffer.flush();
//! assert_eq!(report.delivered, 2);
//! ```

pub mod buffer;
pub mod stats;

pub use buffer::{
    BufferConfig, DeliveryReport, MediaKind, PreRollBuffer, SharedPreRollBuffer, SinkConfig,
    SinkId, SinkTransport, StreamKey, StreamKeyError,
};
pub use stats::{BufferStats, StreamQueueStats};
