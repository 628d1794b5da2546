use serde::Serialize;

use super::context::{ContextSample, ContextSummary};
use super::coordinator::{GenerationError, ReadyTrack, SwitchStyle};
use super::decision::ContextDecision;
use super::playback::TransportState;
use super::prefs::Preferences;

/// Everything the dispatch loop consumes. Sampler ticks, generation
/// completions and user commands all arrive here; one owner processes them
/// one at a time.
#[derive(Debug)]
pub enum Event {
    /// A fresh observation from the sampler.
    Sample(ContextSample),
    /// Async reply from the generation pipeline.
    Generation(GenerationOutcome),
    /// The audio resource reports a natural end of stream. `epoch` is the
    /// playback epoch the resource was handed; stale epochs are ignored.
    TrackEnded { epoch: u64 },
    /// Transport command forwarded by the UI.
    Command(UserCommand),
    /// Replace the preference snapshot; effective on the next submitted
    /// request, never retroactively.
    PrefsChanged(Preferences),
}

#[derive(Debug)]
pub enum GenerationOutcome {
    Foreground {
        seq: u64,
        style: SwitchStyle,
        result: Result<ReadyTrack, GenerationError>,
    },
    Prefetch {
        result: Result<ReadyTrack, GenerationError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Generate,
    Back,
    PlayPause,
    Forward,
}

/// Core -> UI notifications. Serialized as tagged JSON for thin shells.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Every evaluated sample, for observability.
    Decision(ContextDecision),
    /// The analyzed context moved; previous is kept for display.
    ContextShift {
        current: ContextSummary,
        previous: Option<ContextSummary>,
    },
    /// A new stream is active (post-fade for switches). The shell echoes
    /// `epoch` back in its end-of-stream signal.
    TrackChanged {
        audio_url: String,
        tags: String,
        epoch: u64,
    },
    Transport { state: TransportState },
    /// A generation or playback error occurred; human-readable.
    Error { message: String },
}
