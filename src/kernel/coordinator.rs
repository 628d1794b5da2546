use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use super::context::ContextSummary;
use super::event::{Event, GenerationOutcome};
use super::prefs::Preferences;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("context analysis failed: {0}")]
    Analysis(anyhow::Error),
    #[error("track generation failed: {0}")]
    Generation(anyhow::Error),
}

/// Turns a captured frame into a context description. Implementations retry
/// internally; the orchestration core never does.
#[async_trait]
pub trait ContextAnalyzer: Send + Sync {
    async fn describe(&self, frame: &[u8]) -> Result<ContextSummary, GenerationError>;
}

/// Turns a context description plus a preference snapshot into a playable
/// stream. One backend call per invocation.
#[async_trait]
pub trait TrackGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &ContextSummary,
        prefs: &Preferences,
    ) -> Result<TrackStream, GenerationError>;
}

/// What the generator hands back: a URL that plays, never a partial one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackStream {
    pub audio_url: String,
    pub tags: String,
}

/// A fully assembled result of the analyze-then-generate pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyTrack {
    pub audio_url: String,
    pub tags: String,
    pub context: ContextSummary,
}

/// One unit of work for the pipeline. Immutable once submitted.
#[derive(Clone)]
pub struct GenerationRequest {
    pub id: Uuid,
    pub frame: Arc<Vec<u8>>,
    pub prefs: Preferences,
}

/// How a foreground result should reach the audio resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchStyle {
    /// Crossfade into the result (context switches, user-triggered Generate).
    Fade,
    /// Cut straight to the result (user skipped forward).
    Cut,
}

/// Serializes and buffers expensive generation calls.
///
/// Foreground requests are unbounded in count and tagged with a monotonic
/// sequence number; only the newest issued sequence is applied when results
/// come back. Prefetch is single-flight with a single-slot buffer.
pub struct GenerationCoordinator {
    analyzer: Arc<dyn ContextAnalyzer>,
    generator: Arc<dyn TrackGenerator>,
    events: mpsc::Sender<Event>,
    next_track: Option<ReadyTrack>,
    prefetch_in_flight: bool,
    last_issued_seq: u64,
}

impl GenerationCoordinator {
    pub fn new(
        analyzer: Arc<dyn ContextAnalyzer>,
        generator: Arc<dyn TrackGenerator>,
        events: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            analyzer,
            generator,
            events,
            next_track: None,
            prefetch_in_flight: false,
            last_issued_seq: 0,
        }
    }

    /// Foreground generation. Proceeds independently of any running prefetch
    /// and never displaces the prefetch buffer. Returns the sequence number
    /// tagged onto the eventual completion event.
    pub fn request_now(&mut self, style: SwitchStyle, request: GenerationRequest) -> u64 {
        self.last_issued_seq += 1;
        let seq = self.last_issued_seq;
        info!(request = %request.id, seq, "foreground generation dispatched");

        let analyzer = Arc::clone(&self.analyzer);
        let generator = Arc::clone(&self.generator);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = run_pipeline(analyzer.as_ref(), generator.as_ref(), &request).await;
            let _ = events
                .send(Event::Generation(GenerationOutcome::Foreground {
                    seq,
                    style,
                    result,
                }))
                .await;
        });
        seq
    }

    /// Speculative generation of the next track. No-op while a prefetch is
    /// already in flight or the buffer slot is full.
    pub fn ensure_prefetch(&mut self, request: GenerationRequest) {
        if self.prefetch_in_flight || self.next_track.is_some() {
            return;
        }
        self.prefetch_in_flight = true;
        info!(request = %request.id, "prefetch dispatched");

        let analyzer = Arc::clone(&self.analyzer);
        let generator = Arc::clone(&self.generator);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = run_pipeline(analyzer.as_ref(), generator.as_ref(), &request).await;
            let _ = events
                .send(Event::Generation(GenerationOutcome::Prefetch { result }))
                .await;
        });
    }

    /// True when `seq` is the newest foreground sequence issued. Older
    /// completions are stale and must be dropped by the caller.
    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.last_issued_seq
    }

    /// Completion bookkeeping for a prefetch. On success fills the buffer;
    /// on failure returns the error and leaves the slot empty so a later
    /// `ensure_prefetch` can try again. No automatic retry here.
    pub fn finish_prefetch(
        &mut self,
        result: Result<ReadyTrack, GenerationError>,
    ) -> Option<GenerationError> {
        self.prefetch_in_flight = false;
        match result {
            Ok(track) => {
                info!(url = %track.audio_url, "prefetch buffered");
                self.next_track = Some(track);
                None
            }
            Err(err) => Some(err),
        }
    }

    /// Consume the buffered next track. Clearing the slot re-opens the door
    /// for `ensure_prefetch`.
    pub fn take_next(&mut self) -> Option<ReadyTrack> {
        self.next_track.take()
    }

    pub fn has_next(&self) -> bool {
        self.next_track.is_some()
    }

    pub fn is_prefetching(&self) -> bool {
        self.prefetch_in_flight
    }
}

async fn run_pipeline(
    analyzer: &dyn ContextAnalyzer,
    generator: &dyn TrackGenerator,
    request: &GenerationRequest,
) -> Result<ReadyTrack, GenerationError> {
    let context = analyzer.describe(&request.frame).await?;
    let stream = generator.generate(&context, &request.prefs).await?;
    Ok(ReadyTrack {
        audio_url: stream.audio_url,
        tags: stream.tags,
        context,
    })
}
