// @zen-component: LLM-OpenAIProvider
//
//! OpenAI completion provider.
//!
//! Calls the Responses API (`/v1/responses`). Each response carries an `id`
//! which is passed back as `previous_response_id` on the next turn, so the
//! conversation history lives upstream and only the id is kept locally.

use std::env;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{Completion, CompletionError, CompletionProvider};
use crate::conversation::ContinuationToken;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default per-request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the OpenAI provider.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Model name, e.g. `gpt-4o-mini`.
    pub model: String,
    /// API base, without the `/responses` suffix.
    pub base_url: String,
    /// Optional system instructions sent with every turn.
    pub instructions: Option<String>,
    pub request_timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            instructions: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable              | Default                       |
    /// |-----------------------|-------------------------------|
    /// | `OPENAI_API_KEY`      | required                      |
    /// | `OPENAI_MODEL`        | `gpt-4o-mini`                 |
    /// | `OPENAI_BASE_URL`     | `https://api.openai.com/v1`   |
    /// | `OPENAI_INSTRUCTIONS` | none                          |
    pub fn from_env() -> Result<Self, CompletionError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = env::var("OPENAI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            let parsed = Url::parse(&base_url).map_err(|e| {
                CompletionError::Config(format!("Invalid OPENAI_BASE_URL '{base_url}': {e}"))
            })?;
            config.base_url = parsed.to_string();
        }
        config.instructions = env::var("OPENAI_INSTRUCTIONS")
            .ok()
            .filter(|i| !i.trim().is_empty());
        Ok(config)
    }

    fn responses_url(&self) -> String {
        format!("{}/responses", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("instructions", &self.instructions)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

#[derive(Deserialize)]
struct ResponsesResponse {
    id: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    error: Option<ResponsesApiError>,
}

#[derive(Deserialize)]
struct ResponsesApiError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    OutputText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

/// Extract the reply text and continuation token from a Responses API body.
fn parse_response(body: &str) -> Result<Completion, CompletionError> {
    let response: ResponsesResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::Malformed(format!("OpenAI response parse error: {e}")))?;

    if let Some(error) = response.error {
        let code = error.code.unwrap_or_else(|| "unknown".to_string());
        return Err(CompletionError::Rejected(format!("{code}: {}", error.message)));
    }

    let id = response
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CompletionError::Malformed("OpenAI response has no id".to_string()))?;

    let text: String = response
        .output
        .iter()
        .filter_map(|item| match item {
            OutputItem::Message { content } => Some(content),
            OutputItem::Other => None,
        })
        .flatten()
        .filter_map(|part| match part {
            ContentPart::OutputText { text } => Some(text.as_str()),
            ContentPart::Refusal { refusal } => Some(refusal.as_str()),
            ContentPart::Other => None,
        })
        .collect();

    if text.is_empty() {
        return Err(CompletionError::Malformed(
            "OpenAI response has no output text".to_string(),
        ));
    }

    Ok(Completion {
        text,
        continuation: ContinuationToken::new(id),
    })
}

/// [`CompletionProvider`] backed by the OpenAI Responses API.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CompletionError::Config(format!("Could not build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn map_send_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.config.request_timeout)
        } else {
            CompletionError::Transport(format!("OpenAI request failed: {e}"))
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        prompt: &str,
        previous: Option<&ContinuationToken>,
    ) -> Result<Completion, CompletionError> {
        debug!(
            model = %self.config.model,
            resumes = previous.is_some(),
            "requesting OpenAI response"
        );

        let request = ResponsesRequest {
            model: &self.config.model,
            input: prompt,
            previous_response_id: previous.map(ContinuationToken::as_str),
            instructions: self.config.instructions.as_deref(),
        };

        let resp = self
            .client
            .post(self.config.responses_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            warn!(status = status.as_u16(), "OpenAI responses request failed");
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(|e| self.map_send_error(e))?;
        parse_response(&body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
