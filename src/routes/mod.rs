// ============================================================================
// HTTP Route Table
// ============================================================================

pub mod conversations;
pub mod extractors;
pub mod groups;
pub mod health;
pub mod messages;
pub mod ws;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::notify::SessionRegistry;

pub fn create_router(ctx: Arc<AppContext>, sessions: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/users", post(conversations::upsert_user))
        .route(
            "/messages",
            post(messages::send_message).get(messages::list_messages),
        )
        .route("/messages/delete", post(messages::delete_message))
        .route("/messages/read", post(messages::read_conversation))
        .route("/messages/unread", get(messages::unread_count))
        .route(
            "/conversations",
            post(conversations::create_group).get(conversations::get_conversations),
        )
        .route("/conversations/ids", get(conversations::get_conversation_ids))
        .route("/conversations/direct", post(conversations::create_direct))
        .route(
            "/conversations/direct/deactivate",
            post(conversations::deactivate_direct),
        )
        .route(
            "/conversations/direct/reactivate",
            post(conversations::reactivate_direct),
        )
        .route("/groups/invite", post(groups::invite))
        .route("/groups/accept", post(groups::accept_invitation))
        .route("/groups/requests", get(groups::pending_invitations))
        .route("/groups/host", post(groups::set_host))
        .route("/groups/admin", post(groups::set_admin))
        .route("/groups/admin/remove", post(groups::remove_admin))
        .route("/groups/kick", post(groups::kick))
        .route("/groups/exit", post(groups::exit_group))
        .route("/groups/notice", post(groups::post_notice))
        .route("/ws", get(ws::attach_session))
        .layer(Extension(sessions))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
