use std::time::Duration;

use anyhow::{Context, Result};

use crate::sampler::pipeline::SAMPLE_INTERVAL;

const DEFAULT_VISION_MODEL: &str = "claude-3-5-haiku-latest";
const DEFAULT_MUSIC_URL: &str = "https://studio-api.prod.suno.com/api/v2/external/hackmit";

/// Runtime configuration, environment-driven. `.env` files are honored for
/// development setups.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub music_api_key: String,
    pub music_base_url: String,
    pub sample_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let anthropic_api_key =
            std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY is not set")?;
        let music_api_key = std::env::var("SUNO_API_KEY").context("SUNO_API_KEY is not set")?;
        let anthropic_model = std::env::var("UNDERTONE_VISION_MODEL")
            .unwrap_or_else(|_| DEFAULT_VISION_MODEL.to_string());
        let music_base_url =
            std::env::var("UNDERTONE_MUSIC_URL").unwrap_or_else(|_| DEFAULT_MUSIC_URL.to_string());
        let sample_interval = std::env::var("UNDERTONE_SAMPLE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(SAMPLE_INTERVAL);

        Ok(Self {
            anthropic_api_key,
            anthropic_model,
            music_api_key,
            music_base_url,
            sample_interval,
        })
    }
}
