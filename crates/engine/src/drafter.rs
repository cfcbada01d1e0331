//! AI schema drafting collaborator.
//!
//! The orchestrator only needs `generate(prompt) -> text`; parsing the
//! `{files, explanation}` object out of that text lives in
//! `dbprov_core::drafting`. [`HttpDrafter`] talks to any
//! OpenAI-compatible chat completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default request timeout for a drafting call.
const DEFAULT_DRAFT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors from the drafting collaborator.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("AI drafting is not configured (set AI_API_URL, AI_API_KEY and AI_MODEL)")]
    NotConfigured,

    #[error("Drafting request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Drafting API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Drafting response was empty")]
    EmptyResponse,
}

/// Generates text for a prompt.
#[async_trait]
pub trait SchemaDrafter: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, DraftError>;
}

/// Drafting endpoint configuration.
#[derive(Debug, Clone)]
pub struct DrafterConfig {
    /// Base URL; `/chat/completions` is appended.
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl DrafterConfig {
    /// Load from `AI_API_URL`, `AI_API_KEY` and `AI_MODEL`. Returns `None`
    /// unless all three are set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Some(Self {
            api_url: get("AI_API_URL")?.trim_end_matches('/').to_string(),
            api_key: get("AI_API_KEY")?,
            model: get("AI_MODEL")?,
            timeout: DEFAULT_DRAFT_TIMEOUT,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

const SYSTEM_PROMPT: &str = "You are a database engineer. Reply with a single JSON object of the \
form {\"files\": [{\"path\": string, \"content\": string}], \"explanation\": string} and nothing else.";

/// [`SchemaDrafter`] backed by a chat completions HTTP API.
pub struct HttpDrafter {
    client: reqwest::Client,
    config: DrafterConfig,
}

impl HttpDrafter {
    pub fn new(config: DrafterConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl SchemaDrafter for HttpDrafter {
    async fn generate(&self, prompt: &str) -> Result<String, DraftError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.2,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.config.api_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DraftError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(DraftError::EmptyResponse)
    }
}
