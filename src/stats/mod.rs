//! Statistics snapshots for the pre-roll buffer

pub mod metrics;

pub use metrics::{BufferStats, StreamQueueStats};
