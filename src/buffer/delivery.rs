//! Fan-out delivery pass
//!
//! Every pass walks all sinks, their interested streams and every retained
//! frame on those streams, sending whatever the sink has not seen yet and
//! is not older than its cutoff. The scan is deliberately exhaustive: cost
//! is sinks x interested streams x frames per stream.

use super::frame::{BufferedFrame, MediaKind};
use super::sink::{SinkId, SinkRegistry, SinkTransport};
use super::store::FrameStore;

/// Outcome of a single delivery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Frames handed to transports
    pub delivered: usize,
    /// Frames skipped because the transport lacked the capability or the
    /// stream key prefix is unrecognized (retried next pass)
    pub skipped_capability: usize,
    /// Frames skipped because the track index could not be parsed
    pub skipped_malformed: usize,
    /// Sinks removed because their transport was gone
    pub removed_sinks: Vec<SinkId>,
}

enum Dispatch {
    Sent,
    Unsupported,
    Malformed,
}

/// Runs delivery passes and keeps a running delivery count
#[derive(Debug, Default)]
pub struct DeliveryEngine {
    delivered_frames: u64,
}

impl DeliveryEngine {
    /// Create an engine with a zeroed counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one full pass over every sink
    ///
    /// Sinks whose transport has been dropped are collected during the pass
    /// and removed once it completes.
    pub fn run_pass(&mut self, store: &mut FrameStore, sinks: &mut SinkRegistry) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for sink in sinks.iter_mut() {
            let Some(transport) = sink.transport() else {
                report.removed_sinks.push(sink.id);
                continue;
            };

            // Fixed for the whole pass, even once the first frame goes out
            let cutoff = sink.cutoff();

            for key in &sink.interest {
                let Some(queue) = store.queue_mut(key) else {
                    continue;
                };

                for frame in queue.iter_mut() {
                    if frame.timestamp < cutoff || frame.is_delivered_to(sink.id) {
                        continue;
                    }

                    match dispatch(transport.as_ref(), frame) {
                        Dispatch::Sent => {
                            frame.mark_delivered(sink.id);
                            sink.has_delivered_first_frame = true;
                            report.delivered += 1;

                            tracing::trace!(
                                sink = %sink.id,
                                stream = %key,
                                timestamp = frame.timestamp,
                                size = frame.size(),
                                "Delivered frame"
                            );
                        }
                        Dispatch::Unsupported => report.skipped_capability += 1,
                        Dispatch::Malformed => report.skipped_malformed += 1,
                    }
                }
            }
        }

        for id in &report.removed_sinks {
            if sinks.deregister(*id) {
                tracing::debug!(sink = %id, "Removed sink with no valid transport");
            }
        }

        self.delivered_frames += report.delivered as u64;
        report
    }

    /// Frames delivered since creation
    pub fn delivered_frames(&self) -> u64 {
        self.delivered_frames
    }
}

fn dispatch(transport: &dyn SinkTransport, frame: &BufferedFrame) -> Dispatch {
    let kind = match frame.stream_key.kind() {
        Some(MediaKind::Audio) if transport.can_send_audio() => MediaKind::Audio,
        Some(MediaKind::Video) if transport.can_send_video() => MediaKind::Video,
        _ => return Dispatch::Unsupported,
    };

    let track = match frame.stream_key.track_index() {
        Ok(track) => track,
        Err(e) => {
            tracing::warn!(
                stream = %frame.stream_key,
                timestamp = frame.timestamp,
                error = %e,
                "Skipping frame with malformed stream key"
            );
            return Dispatch::Malformed;
        }
    };

    match kind {
        MediaKind::Audio => transport.send_audio(frame.data.clone(), frame.timestamp, track),
        MediaKind::Video => transport.send_video(frame.data.clone(), frame.timestamp, track),
    }

    Dispatch::Sent
}
