//! Buffer error types
//!
//! The buffer's public operations never fail; this error only surfaces from
//! stream key parsing and is absorbed by the delivery pass.

use super::frame::StreamKey;

/// Error parsing the track index out of a stream key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKeyError {
    /// Key has no characters at all
    Empty,
    /// Key is only a prefix with no index
    MissingTrackIndex(StreamKey),
    /// Index contains something other than ASCII digits
    InvalidTrackIndex(StreamKey),
    /// Index does not fit in a u16
    TrackIndexOutOfRange(StreamKey),
}

impl std::fmt::Display for StreamKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKeyError::Empty => write!(f, "Empty stream key"),
            StreamKeyError::MissingTrackIndex(key) => {
                write!(f, "Stream key has no track index: {}", key)
            }
            StreamKeyError::InvalidTrackIndex(key) => {
                write!(f, "Invalid track index in stream key: {}", key)
            }
            StreamKeyError::TrackIndexOutOfRange(key) => {
                write!(f, "Track index out of range: {}", key)
            }
        }
    }
}

impl std::error::Error for StreamKeyError {}
