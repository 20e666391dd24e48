//! Request and response bodies.

use parley_core::chat::FieldViolation;
use serde::{Deserialize, Serialize};

/// `POST /api/chat` body. Fields are optional so that absent values are
/// reported as field violations rather than as an unreadable body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
}

/// 400 body: one entry per violated constraint.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorResponse {
    pub error: Vec<FieldViolation>,
}

/// 500 body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    /// Unexpired conversations in the store.
    pub conversations: usize,
}
