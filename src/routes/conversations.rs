// ============================================================================
// Conversation & Directory Routes
// ============================================================================
//
// Endpoints:
// - POST /users                            - Profile upsert (identity hook)
// - POST /conversations                    - Create a group conversation
// - GET  /conversations?ids=a,b            - Resolve conversation views
// - GET  /conversations/ids                - Ids the caller belongs to
// - POST /conversations/direct             - Create/reactivate a direct pair
// - POST /conversations/direct/deactivate  - Soft-disable on unfriending
// - POST /conversations/direct/reactivate  - Re-enable on re-friending
//
// ============================================================================

use axum::{extract::Query, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::AppError;
use crate::governance;
use crate::membership;
use crate::model::UserProfile;
use crate::routes::extractors::CallerId;

/// POST /users
/// Called by the external identity service whenever a profile changes.
pub async fn upsert_user(
    State(ctx): State<Arc<AppContext>>,
    Json(profile): Json<UserProfile>,
) -> Result<impl IntoResponse, AppError> {
    membership::upsert_user(&ctx, profile).await?;
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub member_ids: Vec<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
}

/// POST /conversations
pub async fn create_group(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = governance::create_group(&ctx, caller.0, req.member_ids, req.name).await?;
    Ok((StatusCode::OK, Json(view)))
}

#[derive(Debug, Deserialize)]
pub struct ConversationsParams {
    /// Comma-separated conversation ids.
    pub ids: String,
}

/// GET /conversations
pub async fn get_conversations(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Query(params): Query<ConversationsParams>,
) -> Result<impl IntoResponse, AppError> {
    let ids: Vec<Uuid> = params
        .ids
        .split(',')
        .filter(|s| !s.is_empty())
        .map(Uuid::parse_str)
        .collect::<Result<_, _>>()
        .map_err(|_| AppError::invalid("malformed conversation id in ids"))?;

    let views = membership::conversations_view(&ctx, caller.0, &ids).await;
    Ok((StatusCode::OK, Json(json!({ "conversations": views }))))
}

/// GET /conversations/ids
pub async fn get_conversation_ids(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
) -> Result<impl IntoResponse, AppError> {
    let ids = membership::conversation_ids(&ctx, caller.0).await;
    Ok((StatusCode::OK, Json(json!({ "conversation_ids": ids }))))
}

#[derive(Debug, Deserialize)]
pub struct DirectPairRequest {
    pub friend_id: Uuid,
}

/// POST /conversations/direct
pub async fn create_direct(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<DirectPairRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = membership::create_direct(&ctx, caller.0, req.friend_id).await?;
    Ok((StatusCode::OK, Json(view)))
}

/// POST /conversations/direct/deactivate
pub async fn deactivate_direct(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<DirectPairRequest>,
) -> Result<impl IntoResponse, AppError> {
    membership::deactivate_direct(&ctx, caller.0, req.friend_id).await?;
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}

/// POST /conversations/direct/reactivate
pub async fn reactivate_direct(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<DirectPairRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = membership::reactivate_direct(&ctx, caller.0, req.friend_id).await?;
    Ok((StatusCode::OK, Json(view)))
}
