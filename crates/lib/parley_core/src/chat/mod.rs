// @zen-component: CHAT-ChatService
//
//! Chat turns: validate, resume the conversation from its last token, ask
//! the provider, then record the new token.
//!
//! The conversation is locked for the whole turn, so concurrent turns on the
//! same conversation run one after another and each one resumes from the
//! token left by the turn before it. The store is written only after the
//! provider has produced a reply that is about to be returned; a failed,
//! timed out or cancelled turn leaves it untouched.

pub mod validation;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::completion::{CompletionError, CompletionProvider};
use crate::conversation::ConversationStore;

pub use validation::{
    ChatTurnRequest, FieldViolation, MAX_PROMPT_CHARS, ValidationErrors, ViolationCode,
};

/// Default bound on a single provider call (60 seconds).
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat turn errors.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Completion failed: {0}")]
    Provider(#[from] CompletionError),
}

/// Reply for one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub message: String,
}

/// Orchestrates chat turns against a store and a provider.
pub struct ChatService {
    store: Arc<ConversationStore>,
    provider: Arc<dyn CompletionProvider>,
    completion_timeout: Duration,
}

impl ChatService {
    pub fn new(store: Arc<ConversationStore>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            store,
            provider,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Validate raw request fields and run the turn.
    ///
    /// Invalid input is rejected before the store or provider is touched.
    pub async fn chat(
        &self,
        prompt: Option<&str>,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply, ChatError> {
        let request = ChatTurnRequest::parse(prompt, conversation_id)?;
        Ok(self.send_message(request).await?)
    }

    /// Run one validated chat turn.
    pub async fn send_message(
        &self,
        request: ChatTurnRequest,
    ) -> Result<ChatReply, CompletionError> {
        let conversation_id = request.conversation_id;
        let turn = self.store.begin_turn(conversation_id).await;
        let previous = turn.previous();

        debug!(
            %conversation_id,
            resumes = previous.is_some(),
            provider = self.provider.name(),
            "starting chat turn"
        );

        let started = Instant::now();
        let completion = match tokio::time::timeout(
            self.completion_timeout,
            self.provider.complete(&request.prompt, previous.as_ref()),
        )
        .await
        {
            Ok(Ok(completion)) => completion,
            Ok(Err(e)) => {
                warn!(%conversation_id, error = %e, "completion failed, conversation unchanged");
                return Err(e);
            }
            Err(_) => {
                warn!(
                    %conversation_id,
                    timeout_ms = self.completion_timeout.as_millis() as u64,
                    "completion timed out, conversation unchanged"
                );
                return Err(CompletionError::Timeout(self.completion_timeout));
            }
        };

        turn.commit(completion.continuation);
        info!(
            %conversation_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat turn completed"
        );

        Ok(ChatReply {
            message: completion.text,
        })
    }
}
