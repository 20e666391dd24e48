// @zen-component: CHAT-ChatEndpoint
//
//! Chat request handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{ChatRequest, ChatResponse};

/// `POST /api/chat` — run one chat turn and return the reply.
///
/// The turn runs inside this handler's future; if the client goes away and
/// the future is dropped, the conversation is not advanced.
pub async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    let Json(body) = body?;
    let reply = state
        .chat
        .chat(body.prompt.as_deref(), body.conversation_id.as_deref())
        .await?;
    Ok(Json(ChatResponse {
        message: reply.message,
    }))
}
