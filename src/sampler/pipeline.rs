use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use image::imageops::FilterType;
use img_hash::{HashAlg, Hasher, HasherConfig};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::kernel::change::Fingerprint;
use crate::kernel::context::ContextSample;
use crate::kernel::event::Event;

/// Capture cadence. Two seconds balances responsiveness against CPU and the
/// cost of downstream analysis.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(2000);

/// Hash input edge length. Hashing a fixed-size downscale keeps fingerprints
/// comparable across monitor resolutions.
const HASH_INPUT_EDGE: u32 = 256;

/// Captures the screen on a fixed cadence, fingerprints each frame and
/// feeds the kernel channel. Runs on a dedicated OS thread; the image work
/// must not block the async runtime. A failed capture produces no event:
/// the tick degrades to silence.
pub struct SamplerPipeline {
    tx: mpsc::Sender<Event>,
    shutdown: CancellationToken,
    interval: Duration,
}

impl SamplerPipeline {
    pub fn new(tx: mpsc::Sender<Event>, shutdown: CancellationToken) -> Self {
        Self {
            tx,
            shutdown,
            interval: SAMPLE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "sampler started");
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Gradient)
            .hash_size(8, 8)
            .to_hasher();

        while !self.shutdown.is_cancelled() {
            match capture_frame() {
                Ok(frame) => match fingerprint_frame(&hasher, frame) {
                    Ok(sample) => {
                        debug!(?sample, "sampled");
                        if self.tx.blocking_send(Event::Sample(sample)).is_err() {
                            // Kernel gone; nothing left to feed.
                            break;
                        }
                    }
                    Err(err) => warn!(%err, "frame encoding failed"),
                },
                Err(err) => {
                    debug!(%err, "capture unavailable");
                }
            }
            std::thread::sleep(self.interval);
        }
        info!("sampler stopped");
    }
}

fn capture_frame() -> Result<image::RgbaImage> {
    let monitors = xcap::Monitor::all().context("monitor enumeration failed")?;
    let monitor = monitors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no monitor available"))?;
    let shot = monitor.capture_image().context("screen capture failed")?;
    // Bridge through raw RGBA bytes so the capture crate's image types never
    // leak into the hashing path.
    let (width, height) = (shot.width(), shot.height());
    let raw = shot.into_raw();
    image::RgbaImage::from_raw(width, height, raw)
        .ok_or_else(|| anyhow!("capture buffer size mismatch"))
}

fn fingerprint_frame(hasher: &Hasher, frame: image::RgbaImage) -> Result<ContextSample> {
    let small = image::imageops::resize(&frame, HASH_INPUT_EDGE, HASH_INPUT_EDGE, FilterType::Triangle);
    let hash = hasher.hash_image(&small);

    // Gradient 8x8 is exactly 64 bits; pack them into the fingerprint word.
    let mut bits: u64 = 0;
    for (i, byte) in hash.as_bytes().iter().take(8).enumerate() {
        bits |= (*byte as u64) << (i * 8);
    }

    let png = encode_png(&frame)?;
    Ok(ContextSample {
        fingerprint: Fingerprint(bits),
        frame: Arc::new(png),
        captured_at: Instant::now(),
    })
}

fn encode_png(frame: &image::RgbaImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    image::png::PngEncoder::new(&mut png)
        .encode(
            frame.as_raw(),
            frame.width(),
            frame.height(),
            image::ColorType::Rgba8,
        )
        .context("png encode failed")?;
    Ok(png)
}
