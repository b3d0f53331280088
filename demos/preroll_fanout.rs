//! Pre-roll fan-out demo
//!
//! Run with: cargo run --example preroll_fanout [MAX_TOTAL_BYTES]
//!
//! A producer task pushes synthetic 30fps video and 50fps audio frames.
//! Two transports join a few seconds in:
//!
//! - `recorder` asks for 2s of pre-roll and takes audio + video
//! - `preview` asks for no explicit window, so it gets one keyframe interval
//!   of video history; it cannot send audio, so audio frames stay pending
//!
//! The preview transport is dropped halfway through to show lazy removal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use preroll_buffer::{BufferConfig, SharedPreRollBuffer, SinkConfig, SinkId, SinkTransport};

/// Transport that counts what it would send
struct CountingTransport {
    name: &'static str,
    audio: bool,
    frames: AtomicU64,
    bytes: AtomicU64,
}

impl CountingTransport {
    fn new(name: &'static str, audio: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            audio,
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        })
    }

    fn record(&self, data: &Bytes) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
    }
}

impl SinkTransport for CountingTransport {
    fn can_send_audio(&self) -> bool {
        self.audio
    }

    fn can_send_video(&self) -> bool {
        true
    }

    fn send_audio(&self, data: Bytes, timestamp: i64, track: u16) {
        self.record(&data);
        tracing::trace!(sink = self.name, timestamp, track, "audio");
    }

    fn send_video(&self, data: Bytes, timestamp: i64, track: u16) {
        self.record(&data);
        tracing::trace!(sink = self.name, timestamp, track, "video");
    }
}

async fn produce(buffer: SharedPreRollBuffer, duration: Duration) {
    let start = tokio::time::Instant::now();
    let mut video_tick = tokio::time::interval(Duration::from_millis(33));
    let mut audio_tick = tokio::time::interval(Duration::from_millis(20));
    let mut frame_no: u64 = 0;

    while start.elapsed() < duration {
        tokio::select! {
            _ = video_tick.tick() => {
                // Keyframe every 30 frames
                let size = if frame_no % 30 == 0 { 24 * 1024 } else { 4 * 1024 };
                frame_no += 1;
                let ts = buffer.now_ms().await;
                buffer.push_frame("v0", &vec![0u8; size], ts).await;
            }
            _ = audio_tick.tick() => {
                let ts = buffer.now_ms().await;
                buffer.push_frame("a0", &[0u8; 256], ts).await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let max_total_bytes: usize = match args.get(1) {
        Some(arg) => arg.parse()?,
        None => 512 * 1024,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("preroll_buffer=info".parse()?)
                .add_directive("preroll_fanout=debug".parse()?),
        )
        .init();

    let buffer =
        SharedPreRollBuffer::with_config(BufferConfig::default().max_total_bytes(max_total_bytes));

    let producer = tokio::spawn(produce(buffer.clone(), Duration::from_secs(8)));

    tokio::time::sleep(Duration::from_secs(3)).await;

    let recorder = CountingTransport::new("recorder", true);
    let recorder_id = SinkId::next();
    buffer
        .register_sink(recorder_id, &recorder, ["a0", "v0"], SinkConfig::new(2000, 1000))
        .await;

    let preview = CountingTransport::new("preview", false);
    let preview_id = SinkId::next();
    buffer
        .register_sink(preview_id, &preview, ["a0", "v0"], SinkConfig::new(0, 1000))
        .await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    tracing::info!(
        frames = preview.frames.load(Ordering::Relaxed),
        bytes = preview.bytes.load(Ordering::Relaxed),
        "Dropping preview transport"
    );
    drop(preview);

    producer.await?;

    let stats = buffer.stats().await;
    let preview_registered = buffer.is_registered(preview_id).await;
    tracing::info!(
        recorder_frames = recorder.frames.load(Ordering::Relaxed),
        recorder_bytes = recorder.bytes.load(Ordering::Relaxed),
        preview_registered = preview_registered,
        total_bytes = stats.total_bytes,
        utilization = %format!("{:.1}%", stats.utilization()),
        frames_pushed = stats.frames_pushed,
        frames_evicted = stats.frames_evicted,
        frames_delivered = stats.frames_delivered,
        "Done"
    );

    buffer.deregister_sink(recorder_id).await;

    Ok(())
}
