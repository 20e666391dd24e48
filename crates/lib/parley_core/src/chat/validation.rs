// @zen-component: CHAT-RequestValidation
//
//! Chat request validation.
//!
//! Produces one [`FieldViolation`] per violated constraint so clients can
//! show field-specific messages.

use serde::Serialize;
use thiserror::Error;

use crate::conversation::ConversationId;

/// Maximum prompt length in characters, measured after trimming.
pub const MAX_PROMPT_CHARS: usize = 1000;

pub const PROMPT_FIELD: &str = "prompt";
pub const CONVERSATION_ID_FIELD: &str = "conversationId";

/// Kind of constraint a field violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    /// Field absent, or empty after trimming.
    Missing,
    /// Prompt longer than [`MAX_PROMPT_CHARS`].
    TooLong,
    /// Conversation id is not a hyphenated UUID.
    InvalidUuid,
    /// Body could not be read as a chat request at all.
    InvalidBody,
}

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub code: ViolationCode,
    /// Path to the offending field; empty for whole-body problems.
    pub path: Vec<String>,
    pub message: String,
}

impl FieldViolation {
    pub fn new(code: ViolationCode, field: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            path: vec![field.to_string()],
            message: message.into(),
        }
    }

    /// Violation for a body that is not valid JSON or has wrongly typed fields.
    pub fn invalid_body(message: impl Into<String>) -> Self {
        Self {
            code: ViolationCode::InvalidBody,
            path: Vec::new(),
            message: message.into(),
        }
    }
}

/// All violations found in one request. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid chat request: {}", describe(.0))]
pub struct ValidationErrors(pub Vec<FieldViolation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub fn into_violations(self) -> Vec<FieldViolation> {
        self.0
    }
}

impl From<FieldViolation> for ValidationErrors {
    fn from(violation: FieldViolation) -> Self {
        Self(vec![violation])
    }
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| {
            if v.path.is_empty() {
                v.message.clone()
            } else {
                format!("{}: {}", v.path.join("."), v.message)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// A validated chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurnRequest {
    /// Trimmed prompt, 1..=[`MAX_PROMPT_CHARS`] characters.
    pub prompt: String,
    pub conversation_id: ConversationId,
}

impl ChatTurnRequest {
    /// Validate raw request fields, reporting every violation at once.
    pub fn parse(
        prompt: Option<&str>,
        conversation_id: Option<&str>,
    ) -> Result<Self, ValidationErrors> {
        let mut violations = Vec::new();

        let prompt = match prompt.map(str::trim) {
            None | Some("") => {
                violations.push(FieldViolation::new(
                    ViolationCode::Missing,
                    PROMPT_FIELD,
                    "Prompt is required",
                ));
                None
            }
            Some(p) if p.chars().count() > MAX_PROMPT_CHARS => {
                violations.push(FieldViolation::new(
                    ViolationCode::TooLong,
                    PROMPT_FIELD,
                    format!("Prompt is too long (max {MAX_PROMPT_CHARS} characters)"),
                ));
                None
            }
            Some(p) => Some(p.to_string()),
        };

        // Blank counts as missing; anything else is parsed untrimmed.
        let conversation_id = match conversation_id.filter(|raw| !raw.trim().is_empty()) {
            None => {
                violations.push(FieldViolation::new(
                    ViolationCode::Missing,
                    CONVERSATION_ID_FIELD,
                    "Conversation id is required",
                ));
                None
            }
            Some(raw) => match raw.parse::<ConversationId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    violations.push(FieldViolation::new(
                        ViolationCode::InvalidUuid,
                        CONVERSATION_ID_FIELD,
                        "Invalid UUID",
                    ));
                    None
                }
            },
        };

        match (prompt, conversation_id) {
            (Some(prompt), Some(conversation_id)) => Ok(Self {
                prompt,
                conversation_id,
            }),
            _ => Err(ValidationErrors(violations)),
        }
    }
}
