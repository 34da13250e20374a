use axum::{
    Json,
    extract::State,
};

use crate::db::DbMessage;
use crate::error::GmaoError;
use crate::handlers::extract::{GmaoJson, GmaoPath};
use crate::router::GmaoState;
use crate::service::rag::{ChatRequest, ChatResponse};

pub async fn chat(
    State(state): State<GmaoState>,
    GmaoJson(request): GmaoJson<ChatRequest>,
) -> Result<Json<ChatResponse>, GmaoError> {
    Ok(Json(state.assistant.answer(request).await?))
}

/// Messages of a conversation, oldest first.
pub async fn get_conversation(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
) -> Result<Json<Vec<DbMessage>>, GmaoError> {
    let messages = state.storage.conversation(&id).await?;
    if messages.is_empty() {
        return Err(GmaoError::NotFound("conversation"));
    }
    Ok(Json(messages))
}
