//! Offline harness: drives the kernel with scripted fingerprints and stub
//! collaborators. No network, no screen capture. Useful for eyeballing
//! decisions, cooldown behavior and crossfades from a terminal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};
use tracing::info;

use undertone::kernel::change::Fingerprint;
use undertone::kernel::context::{ContextSample, ContextSummary};
use undertone::kernel::coordinator::{
    ContextAnalyzer, GenerationError, TrackGenerator, TrackStream,
};
use undertone::kernel::event::Event;
use undertone::kernel::playback::LogSink;
use undertone::kernel::prefs::Preferences;
use undertone::Reactor;

struct ScriptedAnalyzer {
    calls: AtomicUsize,
}

#[async_trait]
impl ContextAnalyzer for ScriptedAnalyzer {
    async fn describe(&self, _frame: &[u8]) -> Result<ContextSummary, GenerationError> {
        const TAGS: &[(&str, &str)] = &[
            ("terminal-build", "Watching a long compile scroll by."),
            ("chrome-docs", "Reading API documentation in the browser."),
            ("vscode-coding", "Editing Rust source in an IDE."),
        ];
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let (tag, details) = TAGS[n % TAGS.len()];
        Ok(ContextSummary {
            tag: tag.to_string(),
            details: details.to_string(),
        })
    }
}

struct ScriptedGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl TrackGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        context: &ContextSummary,
        _prefs: &Preferences,
    ) -> Result<TrackStream, GenerationError> {
        // Pretend the backend takes a moment.
        sleep(Duration::from_millis(400)).await;
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TrackStream {
            audio_url: format!("https://tracks.invalid/{}-{}.mp3", context.tag, n),
            tags: format!("ambient, {}", context.tag),
        })
    }
}

fn sample(bits: u64) -> Event {
    Event::Sample(ContextSample {
        fingerprint: Fingerprint(bits),
        frame: Arc::new(Vec::new()),
        captured_at: Instant::now(),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (events_tx, events_rx) = mpsc::channel(100);
    let (notify_tx, mut notify_rx) = mpsc::channel(100);

    let mut reactor = Reactor::new(
        events_rx,
        events_tx.clone(),
        notify_tx,
        Arc::new(ScriptedAnalyzer {
            calls: AtomicUsize::new(0),
        }),
        Arc::new(ScriptedGenerator {
            calls: AtomicUsize::new(0),
        }),
        LogSink::new(),
    );

    tokio::spawn(async move {
        while let Some(note) = notify_rx.recv().await {
            info!(?note, "notification");
        }
    });

    // Script: a stable desk, one sharp context change, a flurry of changes
    // that the cooldown should flatten, then a natural end of track.
    tokio::spawn(async move {
        let script: &[u64] = &[
            0x0000_0000_0000_0000,
            0x0000_0000_0000_0000,
            0xffff_ffff_0000_0000, // big jump: switch
            0x0000_ffff_0000_ffff, // inside cooldown: suppressed
            0xffff_0000_ffff_0000, // inside cooldown: suppressed
        ];
        for &bits in script {
            let _ = events_tx.send(sample(bits)).await;
            sleep(Duration::from_millis(1000)).await;
        }
        sleep(Duration::from_secs(2)).await;
        // Simulate the shell reporting end-of-stream for the first epoch.
        let _ = events_tx.send(Event::TrackEnded { epoch: 1 }).await;
    });

    tokio::select! {
        _ = reactor.run() => {}
        _ = sleep(Duration::from_secs(15)) => info!("dry run complete"),
    }
}
