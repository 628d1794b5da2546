use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::change::{ChangeDetector, Fingerprint};
use super::context::{ContextSample, ContextSummary};
use super::coordinator::{
    ContextAnalyzer, GenerationCoordinator, GenerationRequest, ReadyTrack, SwitchStyle,
    TrackGenerator,
};
use super::decision::{Action, ContextDecision, DecisionEngine};
use super::event::{Event, GenerationOutcome, Notification, UserCommand};
use super::playback::{AudioSink, PlaybackController, TransportState};
use super::prefs::Preferences;

/// Single owner of the audio resource and all orchestration state.
///
/// Every sampler tick, generation completion and user command funnels
/// through `dispatch`, one event at a time; no two playback mutations can
/// interleave. Generation is the only long-running work and happens in
/// spawned tasks that reply through the event channel.
pub struct Reactor<S: AudioSink> {
    pub receiver: mpsc::Receiver<Event>,
    notifier: mpsc::Sender<Notification>,
    pub engine: DecisionEngine,
    pub coordinator: GenerationCoordinator,
    pub playback: PlaybackController<S>,
    prefs: Preferences,
    last_fingerprint: Option<Fingerprint>,
    latest_frame: Option<Arc<Vec<u8>>>,
    current_context: Option<ContextSummary>,
    previous_context: Option<ContextSummary>,
}

impl<S: AudioSink> Reactor<S> {
    pub fn new(
        receiver: mpsc::Receiver<Event>,
        events: mpsc::Sender<Event>,
        notifier: mpsc::Sender<Notification>,
        analyzer: Arc<dyn ContextAnalyzer>,
        generator: Arc<dyn TrackGenerator>,
        sink: S,
    ) -> Self {
        Self {
            receiver,
            notifier,
            engine: DecisionEngine::new(),
            coordinator: GenerationCoordinator::new(analyzer, generator, events),
            playback: PlaybackController::new(sink),
            prefs: Preferences::default(),
            last_fingerprint: None,
            latest_frame: None,
            current_context: None,
            previous_context: None,
        }
    }

    pub fn current_context(&self) -> Option<&ContextSummary> {
        self.current_context.as_ref()
    }

    /// Event loop. Ends when every event sender is gone.
    pub async fn run(&mut self) {
        info!("orchestration loop started");
        while let Some(event) = self.receiver.recv().await {
            self.dispatch(event).await;
        }
        info!("event channel closed, orchestration loop stopped");
    }

    pub async fn dispatch(&mut self, event: Event) {
        match event {
            Event::Sample(sample) => self.on_sample(sample),
            Event::Generation(outcome) => self.on_generation(outcome).await,
            Event::TrackEnded { epoch } => self.on_track_ended(epoch),
            Event::Command(command) => self.on_command(command).await,
            Event::PrefsChanged(prefs) => {
                debug!(?prefs, "preferences replaced");
                self.prefs = prefs;
            }
        }
    }

    fn on_sample(&mut self, sample: ContextSample) {
        let change =
            ChangeDetector::classify(self.last_fingerprint.as_ref(), &sample.fingerprint);
        self.last_fingerprint = Some(sample.fingerprint);
        self.latest_frame = Some(Arc::clone(&sample.frame));

        let action = self.engine.evaluate(&change, sample.captured_at);
        debug!(distance = change.distance, ?action, "sample evaluated");
        self.notify(Notification::Decision(ContextDecision {
            action,
            distance: change.distance,
            current_context: self.current_context.clone(),
            previous_context: self.previous_context.clone(),
            at: sample.captured_at,
        }));

        if action == Action::SwitchWithFade {
            info!(distance = change.distance, "context changed, requesting replacement track");
            let request = self.snapshot_request(sample.frame);
            self.coordinator.request_now(SwitchStyle::Fade, request);
        }
    }

    async fn on_generation(&mut self, outcome: GenerationOutcome) {
        match outcome {
            GenerationOutcome::Foreground { seq, style, result } => {
                if !self.coordinator.is_current(seq) {
                    info!(seq, "dropping stale foreground result");
                    return;
                }
                match result {
                    Ok(track) => {
                        self.apply_foreground(style, track).await;
                    }
                    Err(err) => {
                        warn!(%err, "foreground generation failed");
                        self.notify(Notification::Error {
                            message: err.to_string(),
                        });
                    }
                }
            }
            GenerationOutcome::Prefetch { result } => {
                if let Some(err) = self.coordinator.finish_prefetch(result) {
                    // Nobody awaits a prefetch; surface and move on. The slot
                    // stays empty so the next natural trigger retries.
                    warn!(%err, "prefetch generation failed");
                    self.notify(Notification::Error {
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    async fn apply_foreground(&mut self, style: SwitchStyle, track: ReadyTrack) {
        let url = track.audio_url.clone();
        let tags = track.tags.clone();
        self.shift_context(track.context.clone());
        let applied = match style {
            SwitchStyle::Fade => self.playback.fade_to(track).await,
            SwitchStyle::Cut => self.playback.load_and_play(track),
        };
        match applied {
            Ok(()) => self.notify(Notification::TrackChanged {
                audio_url: url,
                tags,
                epoch: self.playback.epoch(),
            }),
            Err(err) => {
                warn!(%err, "playback rejected generated track");
                self.notify(Notification::Error {
                    message: err.to_string(),
                });
            }
        }
    }

    fn on_track_ended(&mut self, epoch: u64) {
        if epoch != self.playback.epoch() {
            // A fade or restart already superseded this stream.
            debug!(epoch, current = self.playback.epoch(), "ignoring stale end-of-track");
            return;
        }
        if self.playback.state() == TransportState::Empty {
            return;
        }
        match self.coordinator.take_next() {
            Some(track) => {
                info!("advancing to prefetched track");
                if !self.advance_to(track) {
                    // Never silent, even when the buffered track refuses to
                    // start: loop what we have.
                    self.playback.restart_current();
                    self.notify_now_playing();
                }
            }
            None => {
                info!("no buffered track, looping current");
                self.playback.restart_current();
                self.notify_now_playing();
            }
        }
        self.request_prefetch();
    }

    async fn on_command(&mut self, command: UserCommand) {
        debug!(?command, "user command");
        match command {
            UserCommand::Generate => match self.latest_frame.clone() {
                Some(frame) => {
                    let request = self.snapshot_request(frame);
                    self.coordinator.request_now(SwitchStyle::Fade, request);
                }
                None => self.notify(Notification::Error {
                    message: "no context sampled yet".to_string(),
                }),
            },
            UserCommand::Back => match self.playback.back() {
                Ok(()) => self.notify_now_playing(),
                Err(err) => {
                    warn!(%err, "back navigation failed");
                    self.notify(Notification::Error {
                        message: err.to_string(),
                    });
                }
            },
            UserCommand::PlayPause => {
                self.playback.play_pause();
                self.notify(Notification::Transport {
                    state: self.playback.state(),
                });
            }
            UserCommand::Forward => match self.coordinator.take_next() {
                Some(track) => {
                    self.advance_to(track);
                    self.request_prefetch();
                }
                None => match self.latest_frame.clone() {
                    // The user waits for a fresh track rather than being
                    // told none is available.
                    Some(frame) => {
                        let request = self.snapshot_request(frame);
                        self.coordinator.request_now(SwitchStyle::Cut, request);
                    }
                    None => self.notify(Notification::Error {
                        message: "no context sampled yet".to_string(),
                    }),
                },
            },
        }
    }

    /// Start a freshly generated or buffered track. Returns false when the
    /// resource rejects it, leaving the previous state intact.
    fn advance_to(&mut self, track: ReadyTrack) -> bool {
        let url = track.audio_url.clone();
        let tags = track.tags.clone();
        self.shift_context(track.context.clone());
        match self.playback.load_and_play(track) {
            Ok(()) => {
                self.notify(Notification::TrackChanged {
                    audio_url: url,
                    tags,
                    epoch: self.playback.epoch(),
                });
                true
            }
            Err(err) => {
                warn!(%err, "failed to start track");
                self.notify(Notification::Error {
                    message: err.to_string(),
                });
                false
            }
        }
    }

    fn request_prefetch(&mut self) {
        let Some(frame) = self.latest_frame.clone() else {
            debug!("no frame sampled yet, skipping prefetch");
            return;
        };
        let request = self.snapshot_request(frame);
        self.coordinator.ensure_prefetch(request);
    }

    fn shift_context(&mut self, next: ContextSummary) {
        let previous = self.current_context.replace(next.clone());
        self.previous_context = previous.clone();
        self.notify(Notification::ContextShift {
            current: next,
            previous,
        });
    }

    fn notify_now_playing(&self) {
        if let Some(track) = self.playback.current() {
            self.notify(Notification::TrackChanged {
                audio_url: track.audio_url.clone(),
                tags: track.tags.clone(),
                epoch: self.playback.epoch(),
            });
        }
    }

    fn snapshot_request(&self, frame: Arc<Vec<u8>>) -> GenerationRequest {
        GenerationRequest {
            id: Uuid::new_v4(),
            frame,
            prefs: self.prefs.clone(),
        }
    }

    /// Notifications must never back-pressure the kernel; a slow UI loses
    /// messages instead of stalling playback decisions.
    fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.try_send(notification) {
            warn!(%err, "notification dropped");
        }
    }
}
