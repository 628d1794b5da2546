use serde::Serialize;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use super::coordinator::ReadyTrack;

/// Crossfade shape: a linear ramp to zero over FADE_STEPS discrete steps.
pub const FADE_STEPS: u32 = 10;
pub const FADE_STEP_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio resource rejected {url}: {reason}")]
    ResourceFailed { url: String, reason: String },
}

/// The single owned audio output resource. Implementations start playback as
/// part of `load`; the controller serializes every mutation, so no locking
/// is required of implementors.
pub trait AudioSink: Send {
    /// Begin playing `url` from position zero.
    fn load(&mut self, url: &str) -> Result<(), PlaybackError>;
    /// Restart the current stream from position zero.
    fn restart(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Empty,
    Playing,
    Paused,
}

/// State machine over the audio resource: current track, back-navigable
/// history, transport state and the playback epoch used to detect stale
/// end-of-stream signals.
pub struct PlaybackController<S: AudioSink> {
    sink: S,
    state: TransportState,
    current: Option<ReadyTrack>,
    history: Vec<ReadyTrack>,
    epoch: u64,
}

impl<S: AudioSink> PlaybackController<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: TransportState::Empty,
            current: None,
            history: Vec::new(),
            epoch: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn current(&self) -> Option<&ReadyTrack> {
        self.current.as_ref()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Monotonic counter advanced on every (re)start of playback. A
    /// track-ended signal stamped with an older epoch is stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Switch to `track` immediately. On success the previous current track
    /// is pushed onto the history stack; on failure nothing changes.
    pub fn load_and_play(&mut self, track: ReadyTrack) -> Result<(), PlaybackError> {
        self.sink.load(&track.audio_url)?;
        if let Some(prev) = self.current.take() {
            self.history.push(prev);
        }
        info!(url = %track.audio_url, "now playing");
        self.current = Some(track);
        self.state = TransportState::Playing;
        self.epoch += 1;
        Ok(())
    }

    /// Ramp volume to zero over the fixed step count, switch, then restore
    /// the pre-fade volume. No abrupt jump, no overlap of audible streams.
    /// On a load failure the old stream is still loaded and comes back at
    /// its previous level; the controller keeps its prior state.
    pub async fn fade_to(&mut self, track: ReadyTrack) -> Result<(), PlaybackError> {
        if self.state == TransportState::Empty {
            return self.load_and_play(track);
        }
        let original = self.sink.volume();
        debug!(url = %track.audio_url, "fading out");
        for step in 1..=FADE_STEPS {
            let level = original * (1.0 - step as f32 / FADE_STEPS as f32);
            self.sink.set_volume(level);
            sleep(Duration::from_millis(FADE_STEP_MS)).await;
        }
        let result = self.load_and_play(track);
        self.sink.set_volume(original);
        result
    }

    /// Loop the current track from position zero. The never-silent fallback
    /// while generation catches up.
    pub fn restart_current(&mut self) {
        if self.state == TransportState::Empty {
            return;
        }
        self.sink.restart();
        self.state = TransportState::Playing;
        self.epoch += 1;
    }

    /// Pop the history stack; with nothing to pop, restart instead of
    /// failing. A failed load puts the popped track back.
    pub fn back(&mut self) -> Result<(), PlaybackError> {
        let Some(track) = self.history.pop() else {
            self.restart_current();
            return Ok(());
        };
        match self.load_and_play(track.clone()) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.history.push(track);
                Err(err)
            }
        }
    }

    /// Toggle Playing <-> Paused without touching the track or history.
    pub fn play_pause(&mut self) {
        match self.state {
            TransportState::Playing => {
                self.sink.pause();
                self.state = TransportState::Paused;
            }
            TransportState::Paused => {
                self.sink.resume();
                self.state = TransportState::Playing;
            }
            TransportState::Empty => {}
        }
    }
}

/// Reference sink for headless drivers: logs what an embedding shell would
/// do to its audio element. Loads never fail.
#[derive(Debug)]
pub struct LogSink {
    volume: f32,
    url: Option<String>,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            volume: 1.0,
            url: None,
        }
    }
}

impl AudioSink for LogSink {
    fn load(&mut self, url: &str) -> Result<(), PlaybackError> {
        info!(url, "sink: load and play");
        self.url = Some(url.to_string());
        Ok(())
    }

    fn restart(&mut self) {
        info!(url = self.url.as_deref().unwrap_or("<none>"), "sink: restart");
    }

    fn pause(&mut self) {
        info!("sink: pause");
    }

    fn resume(&mut self) {
        info!("sink: resume");
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        debug!(volume, "sink: volume");
        self.volume = volume;
    }
}
