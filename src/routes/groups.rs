// ============================================================================
// Group Governance Routes
// ============================================================================
//
// Endpoints:
// - POST /groups/invite        - Add members (privileged) or file invitations
// - POST /groups/accept        - Accept a pending invitation
// - GET  /groups/requests      - Pending invitations of groups the caller runs
// - POST /groups/host          - Transfer ownership
// - POST /groups/admin         - Appoint an admin
// - POST /groups/admin/remove  - Demote an admin
// - POST /groups/kick          - Remove a member
// - POST /groups/exit          - Leave a group
// - POST /groups/notice        - Post a group announcement
//
// ============================================================================

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::AppError;
use crate::governance::{self, InviteOutcome};
use crate::routes::extractors::CallerId;

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub conversation_id: Uuid,
    pub invitee_ids: Vec<Uuid>,
}

/// POST /groups/invite
pub async fn invite(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let body = match governance::invite(&ctx, caller.0, req.conversation_id, req.invitee_ids).await? {
        InviteOutcome::Added(view) => json!({ "status": "added", "conversation": view }),
        InviteOutcome::Pending(invitations) => {
            json!({ "status": "pending", "invitations": invitations })
        }
    };
    Ok((StatusCode::OK, Json(body)))
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    pub invitation_id: Uuid,
}

/// POST /groups/accept
pub async fn accept_invitation(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<AcceptInvitationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = governance::accept_invitation(&ctx, caller.0, req.invitation_id).await?;
    Ok((StatusCode::OK, Json(view)))
}

/// GET /groups/requests
pub async fn pending_invitations(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
) -> Result<impl IntoResponse, AppError> {
    let invitations = governance::pending_invitations(&ctx, caller.0).await?;
    Ok((StatusCode::OK, Json(json!({ "invitations": invitations }))))
}

#[derive(Debug, Deserialize)]
pub struct SetHostRequest {
    pub conversation_id: Uuid,
    pub new_host: Uuid,
}

/// POST /groups/host
pub async fn set_host(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<SetHostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = governance::set_host(&ctx, caller.0, req.conversation_id, req.new_host).await?;
    Ok((StatusCode::OK, Json(view)))
}

#[derive(Debug, Deserialize)]
pub struct MemberTargetRequest {
    pub conversation_id: Uuid,
    pub target: Uuid,
}

/// POST /groups/admin
pub async fn set_admin(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<MemberTargetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = governance::set_admin(&ctx, caller.0, req.conversation_id, req.target).await?;
    Ok((StatusCode::OK, Json(view)))
}

/// POST /groups/admin/remove
pub async fn remove_admin(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<MemberTargetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = governance::remove_admin(&ctx, caller.0, req.conversation_id, req.target).await?;
    Ok((StatusCode::OK, Json(view)))
}

/// POST /groups/kick
pub async fn kick(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<MemberTargetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = governance::kick(&ctx, caller.0, req.conversation_id, req.target).await?;
    Ok((StatusCode::OK, Json(view)))
}

#[derive(Debug, Deserialize)]
pub struct ExitGroupRequest {
    pub conversation_id: Uuid,
}

/// POST /groups/exit
pub async fn exit_group(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<ExitGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    governance::exit_group(&ctx, caller.0, req.conversation_id).await?;
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}

#[derive(Debug, Deserialize)]
pub struct NoticeRequest {
    pub conversation_id: Uuid,
    pub content: String,
}

/// POST /groups/notice
pub async fn post_notice(
    State(ctx): State<Arc<AppContext>>,
    caller: CallerId,
    Json(req): Json<NoticeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = governance::post_notice(&ctx, caller.0, req.conversation_id, req.content).await?;
    Ok((StatusCode::OK, Json(view)))
}
