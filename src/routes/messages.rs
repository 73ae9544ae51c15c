// ============================================================================
// Message Routes
// ============================================================================
//
// Endpoints:
// - POST /messages          - Append a message (optionally a reply)
// - GET  /messages          - Activity-cursor paginated feed
// - POST /messages/delete   - Per-viewer soft delete
// - POST /messages/read     - Bulk mark-read for a conversation
// - GET  /messages/unread   - Cached unread count
//
// ============================================================================

use axum::{extract::Query, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::AppError;
use crate::messages;
use crate::routes::extractors::CallerId;
use crate::unread;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: Uuid,
    pub body: String,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
}

/// POST /messages
pub async fn send_message(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = messages::append(&ctx, caller.0, req.conversation_id, req.body, req.reply_to).await?;
    Ok((StatusCode::OK, Json(view)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    /// Exclusive epoch-millisecond lower bound on last-activity.
    #[serde(default)]
    pub after: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /messages
pub async fn list_messages(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, has_more) = messages::list(
        &ctx,
        caller.0,
        params.conversation_id,
        params.after.unwrap_or(0),
        params.limit,
    )
    .await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "messages": page,
            "has_more": has_more,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessageRequest {
    pub message_id: Uuid,
}

/// POST /messages/delete
pub async fn delete_message(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<DeleteMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    messages::soft_delete(&ctx, caller.0, req.message_id).await?;
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}

#[derive(Debug, Deserialize)]
pub struct ReadConversationRequest {
    pub conversation_id: Uuid,
}

/// POST /messages/read
pub async fn read_conversation(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<ReadConversationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let marked = messages::mark_read(&ctx, caller.0, req.conversation_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "status": "ok", "marked": marked })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UnreadParams {
    pub conversation_id: Uuid,
}

/// GET /messages/unread
pub async fn unread_count(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Query(params): Query<UnreadParams>,
) -> Result<impl IntoResponse, AppError> {
    let count = unread::get_unread_count(&ctx, caller.0, params.conversation_id).await?;
    Ok((StatusCode::OK, Json(json!({ "count": count }))))
}
