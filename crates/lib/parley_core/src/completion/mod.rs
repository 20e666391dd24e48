// @zen-component: LLM-CompletionProvider
//
//! Completion providers turn a prompt (plus the continuation token left by
//! the previous turn) into a reply and the token for the next turn.
//!
//! # Providers
//!
//! - [`OpenAiProvider`]: OpenAI Responses API (`/v1/responses`), chaining
//!   turns through `previous_response_id`.

pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::ContinuationToken;

pub use openai::{OpenAiConfig, OpenAiProvider};

/// Errors a completion provider can report.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed upstream response: {0}")]
    Malformed(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// A provider reply and the token that resumes the conversation after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub continuation: ContinuationToken,
}

impl Completion {
    pub fn new(text: impl Into<String>, continuation: impl Into<ContinuationToken>) -> Self {
        Self {
            text: text.into(),
            continuation: continuation.into(),
        }
    }
}

/// Capability that answers one chat turn.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Answer `prompt`, resuming from `previous` when the conversation has
    /// earlier turns.
    async fn complete(
        &self,
        prompt: &str,
        previous: Option<&ContinuationToken>,
    ) -> Result<Completion, CompletionError>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}
