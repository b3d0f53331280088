//! Pre-roll frame buffer with multi-sink fan-out
//!
//! The buffer retains recently captured frames per stream under a global
//! byte cap and hands them to any number of sinks (transports). A sink that
//! joins late receives a bounded backlog ("pre-roll") before live frames.
//!
//! # Architecture
//!
//! ```text
//!                         PreRollBuffer
//!          ┌─────────────────────────────────────────┐
//!          │ FrameStore                              │
//!          │   "a0" -> [f f f]                       │
//!          │   "v0" -> [f f f f]                     │
//!          │   total_bytes                           │
//!          │ SinkRegistry                            │
//!          │   SinkId -> Sink { Weak<transport>,     │
//!          │                    interest, cutoff }   │
//!          └───────────────────┬─────────────────────┘
//!                              │
//!   push_frame() ──► EvictionController::make_room()
//!                ──► FrameStore::push()
//!                ──► DeliveryEngine::run_pass() ──► send_audio()/send_video()
//! ```
//!
//! # Eviction order
//!
//! Eviction always removes the frame with the smallest timestamp across all
//! streams. When several stream fronts share that timestamp, the stream key
//! that sorts first (plain string order, so `"a10"` before `"a2"` before
//! `"v0"`) loses its front frame. Delivery status is not consulted.
//!
//! # Delivery
//!
//! Each frame remembers which sinks it reached, so a (frame, sink) pair is
//! delivered at most once. Frames a sink cannot take yet (missing
//! capability, unknown prefix, malformed track index) stay eligible and
//! are retried on every pass until evicted.

pub mod config;
pub mod delivery;
pub mod error;
pub mod eviction;
pub mod frame;
pub mod preroll;
pub mod shared;
pub mod sink;
pub mod store;

pub use config::{BufferConfig, SinkConfig, DEFAULT_MAX_TOTAL_BYTES};
pub use delivery::{DeliveryEngine, DeliveryReport};
pub use error::StreamKeyError;
pub use eviction::EvictionController;
pub use frame::{BufferedFrame, MediaKind, StreamKey};
pub use preroll::PreRollBuffer;
pub use shared::SharedPreRollBuffer;
pub use sink::{Sink, SinkId, SinkRegistry, SinkTransport};
pub use store::{FrameStore, StreamQueue};
