//! Buffered frame types
//!
//! This module defines the key type identifying a media track and the
//! frames retained for pre-roll delivery.

use std::collections::HashSet;

use bytes::Bytes;

use super::error::StreamKeyError;
use super::sink::SinkId;

/// Kind of media carried on a stream, derived from the stream key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Prefix `'a'`
    Audio,
    /// Prefix `'v'`
    Video,
}

/// Identifier for one media track (e.g. `"a0"`, `"v1"`)
///
/// The first character selects the media kind and the remainder is the
/// numeric track index. Keys order lexicographically by their string form,
/// so `"a10"` sorts before `"a2"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey(String);

impl StreamKey {
    /// Create a stream key from its raw string form
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build an audio key for the given track index
    pub fn audio(track: u16) -> Self {
        Self(format!("a{}", track))
    }

    /// Build a video key for the given track index
    pub fn video(track: u16) -> Self {
        Self(format!("v{}", track))
    }

    /// Raw string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Media kind from the prefix, or `None` for an unrecognized prefix
    pub fn kind(&self) -> Option<MediaKind> {
        match self.0.as_bytes().first() {
            Some(b'a') => Some(MediaKind::Audio),
            Some(b'v') => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Parse the track index from the suffix after the 1-character prefix
    ///
    /// Only ASCII decimal digits are accepted; signs, whitespace and
    /// trailing garbage are rejected.
    pub fn track_index(&self) -> Result<u16, StreamKeyError> {
        let mut chars = self.0.chars();
        if chars.next().is_none() {
            return Err(StreamKeyError::Empty);
        }
        let suffix = chars.as_str();

        if suffix.is_empty() {
            return Err(StreamKeyError::MissingTrackIndex(self.clone()));
        }
        if !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StreamKeyError::InvalidTrackIndex(self.clone()));
        }

        suffix
            .parse::<u16>()
            .map_err(|_| StreamKeyError::TrackIndexOutOfRange(self.clone()))
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for StreamKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// A retained media frame
///
/// The payload is owned by the frame; transports receive cheap `Bytes`
/// clones of it.
#[derive(Debug, Clone)]
pub struct BufferedFrame {
    /// Stream this frame belongs to
    pub stream_key: StreamKey,
    /// Frame payload
    pub data: Bytes,
    /// Presentation timestamp in milliseconds
    pub timestamp: i64,
    /// Sinks this frame has already been delivered to
    delivered_to: HashSet<SinkId>,
}

impl BufferedFrame {
    /// Create a frame by copying the payload
    pub fn new(stream_key: StreamKey, data: &[u8], timestamp: i64) -> Self {
        Self {
            stream_key,
            data: Bytes::copy_from_slice(data),
            timestamp,
            delivered_to: HashSet::new(),
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Whether this frame was already delivered to `sink`
    pub fn is_delivered_to(&self, sink: SinkId) -> bool {
        self.delivered_to.contains(&sink)
    }

    /// Record a delivery to `sink`; returns false if it was already recorded
    pub(super) fn mark_delivered(&mut self, sink: SinkId) -> bool {
        self.delivered_to.insert(sink)
    }

    /// Number of sinks this frame has reached
    pub fn delivery_count(&self) -> usize {
        self.delivered_to.len()
    }
}
