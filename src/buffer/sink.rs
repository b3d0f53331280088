//! Sink registry
//!
//! A sink is a downstream transport subscribed to a set of stream keys.
//! Sinks are keyed by a [`SinkId`] token rather than by the transport
//! itself, and the buffer only holds a weak reference to the transport so
//! that dropping it externally is enough to retire the sink.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;

use super::config::SinkConfig;
use super::frame::StreamKey;

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Transport capability consumed by the delivery pass
///
/// Send methods are called with the buffer lock held and must not block.
pub trait SinkTransport: Send + Sync {
    /// Whether audio can currently be sent
    fn can_send_audio(&self) -> bool;

    /// Whether video can currently be sent
    fn can_send_video(&self) -> bool;

    /// Send one audio frame
    fn send_audio(&self, data: Bytes, timestamp: i64, track: u16);

    /// Send one video frame
    fn send_video(&self, data: Bytes, timestamp: i64, track: u16);
}

/// Registration token identifying a sink
///
/// Caller-chosen ids ([`SinkId::new`]) and allocated ids ([`SinkId::next`])
/// live in separate namespaces, so an allocated id never equals any
/// caller-chosen one even when the raw values match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId {
    allocated: bool,
    value: u64,
}

impl SinkId {
    /// Wrap a caller-chosen id
    pub fn new(id: u64) -> Self {
        Self {
            allocated: false,
            value: id,
        }
    }

    /// Allocate a process-unique id
    pub fn next() -> Self {
        Self {
            allocated: true,
            value: NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Raw value within the id's namespace
    pub fn get(&self) -> u64 {
        self.value
    }

    /// Whether this id came from [`SinkId::next`]
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }
}

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.allocated {
            write!(f, "sink@{}", self.value)
        } else {
            write!(f, "sink#{}", self.value)
        }
    }
}

/// Subscription record for one sink
pub struct Sink {
    /// Registration token
    pub id: SinkId,

    transport: Weak<dyn SinkTransport>,

    /// Stream keys this sink wants
    pub interest: BTreeSet<StreamKey>,

    /// Registration time in ms on the buffer clock
    pub registered_at_ms: i64,

    /// Pre-roll options
    pub config: SinkConfig,

    /// Set after the first successful delivery
    pub has_delivered_first_frame: bool,
}

impl Sink {
    /// Upgrade the transport reference; `None` once the transport is gone
    pub fn transport(&self) -> Option<Arc<dyn SinkTransport>> {
        self.transport.upgrade()
    }

    /// Earliest timestamp this sink accepts on the current pass
    ///
    /// Before the first delivery this is the registration time minus the
    /// lookback window, which may be negative. Afterwards it is 0: every
    /// timestamp >= 0 is accepted and the per-frame delivered-set alone
    /// prevents duplicates. Negative timestamps are never sent again.
    pub fn cutoff(&self) -> i64 {
        if self.has_delivered_first_frame {
            0
        } else {
            self.registered_at_ms.saturating_sub(self.config.lookback_ms())
        }
    }

    /// Whether this sink wants frames from `stream_key`
    pub fn is_interested_in(&self, stream_key: &StreamKey) -> bool {
        self.interest.contains(stream_key)
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.id)
            .field("transport_alive", &(self.transport.strong_count() > 0))
            .field("interest", &self.interest)
            .field("registered_at_ms", &self.registered_at_ms)
            .field("config", &self.config)
            .field("has_delivered_first_frame", &self.has_delivered_first_frame)
            .finish()
    }
}

/// Table of sinks, iterated in `SinkId` order
#[derive(Debug, Default)]
pub struct SinkRegistry {
    sinks: BTreeMap<SinkId, Sink>,
}

impl SinkRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the subscription for `id`
    ///
    /// The interest set is replaced, not merged, and the pre-roll state is
    /// reset. Returns true if an existing record was replaced.
    pub fn register(
        &mut self,
        id: SinkId,
        transport: Weak<dyn SinkTransport>,
        interest: BTreeSet<StreamKey>,
        config: SinkConfig,
        now_ms: i64,
    ) -> bool {
        let sink = Sink {
            id,
            transport,
            interest,
            registered_at_ms: now_ms,
            config,
            has_delivered_first_frame: false,
        };

        self.sinks.insert(id, sink).is_some()
    }

    /// Remove the subscription for `id`; returns whether it existed
    pub fn deregister(&mut self, id: SinkId) -> bool {
        self.sinks.remove(&id).is_some()
    }

    /// Look up a sink
    pub fn get(&self, id: SinkId) -> Option<&Sink> {
        self.sinks.get(&id)
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: SinkId) -> bool {
        self.sinks.contains_key(&id)
    }

    pub(super) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Sink> {
        self.sinks.values_mut()
    }

    /// Iterate sinks in id order
    pub fn iter(&self) -> impl Iterator<Item = &Sink> {
        self.sinks.values()
    }

    /// Number of registered sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sinks are registered
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
