use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Config;
use crate::kernel::context::ContextSummary;
use crate::kernel::coordinator::{ContextAnalyzer, GenerationError};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const CLASSIFY_PROMPT: &str = "You are classifying the user's current activity from a screenshot.\n\
Return JSON ONLY as:\n\
{\n\
  \"tag\": stable kebab-case tag focusing on app/site and activity (e.g. 'vscode-coding', 'chrome-docs', 'terminal-build'),\n\
  \"details\": one short sentence\n\
}\n\
Keep the tag stable across very similar screenshots.";

/// Vision-model classification of captured frames. The one internal retry
/// satisfies the collaborator contract; the orchestration core never retries.
pub struct VisionService {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<ImageSource>,
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: String,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    text: String,
}

impl VisionService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: config.anthropic_api_key.clone(),
            model: config.anthropic_model.clone(),
        }
    }

    async fn classify_once(&self, frame: &[u8]) -> Result<ContextSummary> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: 300,
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentBlock {
                        kind: "text".to_string(),
                        text: Some(CLASSIFY_PROMPT.to_string()),
                        source: None,
                    },
                    ContentBlock {
                        kind: "image".to_string(),
                        text: None,
                        source: Some(ImageSource {
                            kind: "base64".to_string(),
                            media_type: "image/png".to_string(),
                            data: BASE64_STD.encode(frame),
                        }),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .context("vision request failed")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("vision API error ({status}): {body}"));
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&body).context("vision response parse failed")?;
        let raw = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| anyhow!("empty vision response"))?;
        let json = extract_json_block(&raw).unwrap_or(raw);
        let summary: ContextSummary =
            serde_json::from_str(&json).context("context summary parse failed")?;
        Ok(summary)
    }
}

/// Return the outermost JSON object in `s`, tolerating fenced code blocks
/// and prose around it.
pub fn extract_json_block(s: &str) -> Option<String> {
    let trimmed = s.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(trimmed[start..=end].to_string())
}

#[async_trait]
impl ContextAnalyzer for VisionService {
    async fn describe(&self, frame: &[u8]) -> Result<ContextSummary, GenerationError> {
        match self.classify_once(frame).await {
            Ok(summary) => Ok(summary),
            Err(first) => {
                warn!(%first, "vision call failed, retrying once");
                self.classify_once(frame)
                    .await
                    .map_err(GenerationError::Analysis)
            }
        }
    }
}
