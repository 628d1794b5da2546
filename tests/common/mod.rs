#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use undertone::kernel::change::Fingerprint;
use undertone::kernel::context::{ContextSample, ContextSummary};
use undertone::kernel::coordinator::{
    ContextAnalyzer, GenerationError, ReadyTrack, TrackGenerator, TrackStream,
};
use undertone::kernel::event::{Event, Notification};
use undertone::kernel::playback::{AudioSink, PlaybackError};
use undertone::kernel::prefs::Preferences;
use undertone::Reactor;

/// Analyzer stub: counts calls; can hang forever or fail every call.
pub struct StubAnalyzer {
    pub calls: AtomicUsize,
    hang: bool,
    fail: bool,
}

impl StubAnalyzer {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            hang: false,
            fail: false,
        })
    }

    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            hang: true,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            hang: false,
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextAnalyzer for StubAnalyzer {
    async fn describe(&self, _frame: &[u8]) -> Result<ContextSummary, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(GenerationError::Analysis(anyhow::anyhow!(
                "stub analysis failure"
            )));
        }
        Ok(ContextSummary {
            tag: "stub-activity".to_string(),
            details: "A stubbed description of the screen.".to_string(),
        })
    }
}

/// Generator stub: unique URL per call; can start failing after N successes.
pub struct StubGenerator {
    pub calls: AtomicUsize,
    fail_after: Option<usize>,
    pub last_prefs: Mutex<Option<Preferences>>,
}

impl StubGenerator {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_after: None,
            last_prefs: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_after: Some(0),
            last_prefs: Mutex::new(None),
        })
    }

    pub fn failing_after(successes: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_after: Some(successes),
            last_prefs: Mutex::new(None),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackGenerator for StubGenerator {
    async fn generate(
        &self,
        _context: &ContextSummary,
        prefs: &Preferences,
    ) -> Result<TrackStream, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prefs.lock().unwrap() = Some(prefs.clone());
        if let Some(limit) = self.fail_after {
            if n >= limit {
                return Err(GenerationError::Generation(anyhow::anyhow!(
                    "stub generation failure"
                )));
            }
        }
        Ok(TrackStream {
            audio_url: format!("https://tracks.test/{n}.mp3"),
            tags: "stub, ambient".to_string(),
        })
    }
}

/// Recording sink: every mutation is observable, loads can be forced to fail.
pub struct MockSink {
    pub loads: Vec<String>,
    pub restarts: usize,
    pub paused: bool,
    pub volume: f32,
    pub volume_trace: Vec<f32>,
    pub fail_next_load: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            loads: Vec::new(),
            restarts: 0,
            paused: false,
            volume: 1.0,
            volume_trace: Vec::new(),
            fail_next_load: false,
        }
    }
}

impl AudioSink for MockSink {
    fn load(&mut self, url: &str) -> Result<(), PlaybackError> {
        if self.fail_next_load {
            self.fail_next_load = false;
            return Err(PlaybackError::ResourceFailed {
                url: url.to_string(),
                reason: "mock refusal".to_string(),
            });
        }
        self.loads.push(url.to_string());
        self.paused = false;
        Ok(())
    }

    fn restart(&mut self) {
        self.restarts += 1;
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.volume_trace.push(volume);
    }
}

pub struct Harness {
    pub reactor: Reactor<MockSink>,
    pub events: mpsc::Sender<Event>,
    pub notes: mpsc::Receiver<Notification>,
    pub analyzer: Arc<StubAnalyzer>,
    pub generator: Arc<StubGenerator>,
}

pub fn harness() -> Harness {
    harness_with(StubAnalyzer::ok(), StubGenerator::ok())
}

pub fn harness_with(analyzer: Arc<StubAnalyzer>, generator: Arc<StubGenerator>) -> Harness {
    let (events_tx, events_rx) = mpsc::channel(100);
    let (notify_tx, notes) = mpsc::channel(100);
    let reactor = Reactor::new(
        events_rx,
        events_tx.clone(),
        notify_tx,
        analyzer.clone(),
        generator.clone(),
        MockSink::new(),
    );
    Harness {
        reactor,
        events: events_tx,
        notes,
        analyzer,
        generator,
    }
}

pub fn sample(bits: u64) -> Event {
    sample_at(bits, Instant::now())
}

pub fn sample_at(bits: u64, at: Instant) -> Event {
    Event::Sample(ContextSample {
        fingerprint: Fingerprint(bits),
        frame: Arc::new(Vec::new()),
        captured_at: at,
    })
}

pub fn track(url: &str) -> ReadyTrack {
    ReadyTrack {
        audio_url: url.to_string(),
        tags: "test-tags".to_string(),
        context: ContextSummary {
            tag: "test-context".to_string(),
            details: "A test context.".to_string(),
        },
    }
}

/// Let spawned pipelines complete, then step every queued completion event
/// through the reactor until the channel drains.
pub async fn settle(h: &mut Harness) {
    loop {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        match h.reactor.receiver.try_recv() {
            Ok(event) => h.reactor.dispatch(event).await,
            Err(_) => break,
        }
    }
}

/// Drain queued notifications without blocking.
pub fn collect_notes(h: &mut Harness) -> Vec<Notification> {
    let mut notes = Vec::new();
    while let Ok(note) = h.notes.try_recv() {
        notes.push(note);
    }
    notes
}
