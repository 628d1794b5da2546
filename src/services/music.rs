use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

use crate::config::Config;
use crate::kernel::context::ContextSummary;
use crate::kernel::coordinator::{GenerationError, TrackGenerator, TrackStream};
use crate::kernel::prefs::{Preferences, VocalsGender};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLLS: u32 = 36; // ~3 minutes

const TOPIC_LIMIT: usize = 500;
const TAGS_LIMIT: usize = 100;

/// Rotation palette when the user pinned no genres; keeps consecutive
/// tracks from collapsing into one style.
const GENRE_PALETTE: &[&str] = &[
    "lofi",
    "ambient",
    "classical",
    "jazz",
    "post-rock",
    "acoustic",
    "synthwave",
    "blues",
];
const RECENT_GENRE_CAP: usize = 5;

/// Generation backend client: submit a request, poll until a stream URL
/// appears or the task fails. One backend call chain per `generate`.
pub struct MusicService {
    client: Client,
    api_key: String,
    base_url: String,
    /// Most-recent-first primary genres, this session only.
    recent_genres: Mutex<Vec<String>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GenerateRequest {
    pub topic: String,
    pub tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub make_instrumental: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    id: String,
}

#[derive(Deserialize)]
struct Clip {
    status: Option<String>,
    tags: Option<String>,
    audio_url: Option<String>,
    stream_audio_url: Option<String>,
}

impl MusicService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: config.music_api_key.clone(),
            base_url: config.music_base_url.clone(),
            recent_genres: Mutex::new(Vec::new()),
        }
    }

    /// Build the backend payload from a context description and a
    /// preference snapshot. Instrumental overrides any vocals preference.
    pub fn build_request(&self, context: &ContextSummary, prefs: &Preferences) -> GenerateRequest {
        let mut tag_list: Vec<String> = vec![self.pick_primary_genre(prefs)];
        for genre in &prefs.genres {
            if !tag_list.iter().any(|t| t.eq_ignore_ascii_case(genre)) {
                tag_list.push(genre.clone());
            }
        }
        if prefs.instrumental {
            tag_list.push("instrumental".to_string());
        } else if let Some(gender) = prefs.vocals_gender {
            tag_list.push(
                match gender {
                    VocalsGender::Male => "male vocals",
                    VocalsGender::Female => "female vocals",
                }
                .to_string(),
            );
        }

        let mut topic = format!(
            "Background music for {}: {} The track should support the activity without pulling attention away from it.",
            context.tag, context.details
        );
        if prefs.silly_mode {
            topic.push_str(" Keep the mood playful and witty.");
        }

        GenerateRequest {
            topic: shorten(&topic, TOPIC_LIMIT),
            tags: shorten(&tag_list.join(", "), TAGS_LIMIT),
            prompt: None,
            make_instrumental: prefs.instrumental,
        }
    }

    /// Record the primary genre of a delivered track for this session's
    /// rotation. Most recent first, capped.
    pub fn note_genre(&self, tags: &str) {
        let Some(primary) = tags.split(',').map(str::trim).find(|t| !t.is_empty()) else {
            return;
        };
        let mut recent = self
            .recent_genres
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        recent.retain(|g| !g.eq_ignore_ascii_case(primary));
        recent.insert(0, primary.to_string());
        recent.truncate(RECENT_GENRE_CAP);
    }

    fn pick_primary_genre(&self, prefs: &Preferences) -> String {
        if let Some(first) = prefs.genres.iter().next() {
            return first.clone();
        }
        let recent = self
            .recent_genres
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        GENRE_PALETTE
            .iter()
            .find(|g| !recent.iter().any(|r| r.eq_ignore_ascii_case(g)))
            .unwrap_or(&GENRE_PALETTE[0])
            .to_string()
    }

    async fn submit(&self, request: &GenerateRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .context("generate request failed")?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("generate error ({status}): {body}"));
        }
        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("generate response parse failed")?;
        Ok(parsed.id)
    }

    async fn poll_ready(&self, id: &str) -> Result<TrackStream> {
        for _ in 0..MAX_POLLS {
            let response = self
                .client
                .get(format!("{}/clips?ids={}", self.base_url, id))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .context("clips request failed")?;
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!("clips error ({status}): {body}"));
            }

            let clips = parse_clips(&body)?;
            if clips
                .iter()
                .any(|c| matches!(c.status.as_deref(), Some(s) if s.eq_ignore_ascii_case("FAILED")))
            {
                return Err(anyhow!("backend reported the generation task FAILED"));
            }
            if let Some(stream) = clips.iter().find_map(clip_stream) {
                return Ok(stream);
            }
            sleep(POLL_INTERVAL).await;
        }
        Err(anyhow!("timed out waiting for a stream URL"))
    }
}

fn clip_stream(clip: &Clip) -> Option<TrackStream> {
    // Prefer the stream URL; fall back to the static one.
    let url = clip
        .stream_audio_url
        .clone()
        .or_else(|| clip.audio_url.clone())?;
    Some(TrackStream {
        audio_url: url,
        tags: clip.tags.clone().unwrap_or_default(),
    })
}

fn parse_clips(body: &str) -> Result<Vec<Clip>> {
    // Either a bare array or an object wrapping { clips: [...] }.
    if let Ok(clips) = serde_json::from_str::<Vec<Clip>>(body) {
        return Ok(clips);
    }
    #[derive(Deserialize)]
    struct Wrapper {
        clips: Vec<Clip>,
    }
    let wrapper: Wrapper = serde_json::from_str(body).context("clips response parse failed")?;
    Ok(wrapper.clips)
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let take = max.saturating_sub(3);
    format!("{}...", s.chars().take(take).collect::<String>())
}

#[async_trait]
impl TrackGenerator for MusicService {
    async fn generate(
        &self,
        context: &ContextSummary,
        prefs: &Preferences,
    ) -> Result<TrackStream, GenerationError> {
        let request = self.build_request(context, prefs);
        debug!(topic = %request.topic, tags = %request.tags, "submitting generation");

        let outcome = async {
            let id = self.submit(&request).await?;
            self.poll_ready(&id).await
        }
        .await;

        match outcome {
            Ok(mut stream) => {
                if stream.tags.is_empty() {
                    stream.tags = request.tags.clone();
                }
                self.note_genre(&stream.tags);
                Ok(stream)
            }
            Err(err) => Err(GenerationError::Generation(err)),
        }
    }
}
