use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::membership;
use crate::model::{millis, Message, MessageView};
use crate::notify::{fan_out, EventKind};

// ============================================================================
// Store
// ============================================================================

/// Ordered, threaded, per-user-visible message log.
///
/// One write-lock section covers each mutating call, so the reply-count bump
/// and the message insert of an append commit together or not at all, and a
/// bulk mark-read runs as a single batch.
pub struct MessageStore {
    inner: RwLock<HashMap<Uuid, Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Authoritative unread count: messages in the conversation not sent by
    /// and not yet read by the viewer.
    pub async fn unread_scan(&self, conversation_id: Uuid, viewer: Uuid) -> u64 {
        let messages = self.inner.read().await;
        messages
            .values()
            .filter(|m| m.conversation_id == conversation_id && m.unread_by(viewer))
            .count() as u64
    }

    /// Removes every message of a conversation. Only cascading conversation
    /// deletion reaches this; the per-user delete action never does.
    pub async fn purge_conversation(&self, conversation_id: Uuid) {
        self.inner
            .write()
            .await
            .retain(|_, m| m.conversation_id != conversation_id);
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Appends a message to a conversation the sender actively belongs to.
///
/// The receiver set is a snapshot of the member set at send time; later
/// membership changes never grant or revoke visibility of this message.
/// When replying, the target's reply-count increment and activity bump
/// commit in the same lock section as the insert.
pub async fn append(
    ctx: &AppContext,
    sender: Uuid,
    conversation_id: Uuid,
    body: String,
    reply_to: Option<Uuid>,
) -> AppResult<MessageView> {
    let body = body.trim().to_string();
    if body.is_empty() {
        return Err(AppError::invalid("message body must not be empty"));
    }
    if body.chars().count() > ctx.config.max_message_len {
        return Err(AppError::invalid(format!(
            "message body exceeds {} characters",
            ctx.config.max_message_len
        )));
    }

    let receivers = membership::receiver_snapshot(ctx, sender, conversation_id).await?;

    let view = {
        let mut messages = ctx.messages.inner.write().await;
        let now = Utc::now();

        if let Some(target_id) = reply_to {
            let target = messages
                .get_mut(&target_id)
                .filter(|m| m.conversation_id == conversation_id)
                .ok_or_else(|| {
                    AppError::not_found("reply target does not exist in this conversation")
                })?;
            target.reply_count += 1;
            target.last_activity = now;
        }

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender,
            body,
            sent_at: now,
            last_activity: now,
            reply_to,
            reply_count: 0,
            receivers: receivers.iter().copied().collect(),
            read_by: Default::default(),
            deleted_by: Default::default(),
        };
        let view = MessageView::from(&message);
        messages.insert(message.id, message);
        view
    };

    // Best-effort cache maintenance; a missing entry recomputes on demand.
    for member in receivers.iter().filter(|m| **m != sender) {
        ctx.unread.bump(conversation_id, *member).await;
    }

    tracing::debug!(
        message_id = %view.id,
        conversation_id = %conversation_id,
        reply = reply_to.is_some(),
        "Message appended"
    );

    fan_out(&ctx.notifier, receivers, EventKind::GeneralUpdate).await;
    Ok(view)
}

/// Messages the viewer receives and has not tombstoned, ordered by
/// last-activity ascending, strictly after the `after` cursor
/// (epoch milliseconds, exclusive).
///
/// Because last-activity is the cursor key, a message whose read state or
/// reply count changed after the viewer's last sync reappears in the next
/// page: the feed is a change feed, not an append-only log.
pub async fn list(
    ctx: &AppContext,
    viewer: Uuid,
    conversation_id: Option<Uuid>,
    after: i64,
    limit: Option<usize>,
) -> AppResult<(Vec<MessageView>, bool)> {
    let limit = limit
        .unwrap_or(ctx.config.default_page_limit)
        .min(ctx.config.max_page_limit)
        .max(1);

    if let Some(id) = conversation_id {
        let state = ctx.membership.read().await;
        let conversation = state.require_conversation(id)?;
        if !conversation.is_member(viewer) {
            return Err(AppError::forbidden("caller is not a conversation member"));
        }
    }

    let messages = ctx.messages.inner.read().await;
    let mut page: Vec<&Message> = messages
        .values()
        .filter(|m| conversation_id.map_or(true, |id| m.conversation_id == id))
        .filter(|m| m.visible_to(viewer))
        .filter(|m| millis(m.last_activity) > after)
        .collect();
    page.sort_by_key(|m| (m.last_activity, m.sent_at, m.id));

    let has_more = page.len() > limit;
    page.truncate(limit);
    Ok((page.into_iter().map(MessageView::from).collect(), has_more))
}

/// Adds the viewer to the message's tombstone set. Repeating the call fails
/// with `AlreadyDeleted` so clients can detect the no-op case.
pub async fn soft_delete(ctx: &AppContext, viewer: Uuid, message_id: Uuid) -> AppResult<()> {
    let mut messages = ctx.messages.inner.write().await;
    let message = messages
        .get_mut(&message_id)
        .ok_or_else(|| AppError::not_found("message does not exist"))?;
    if !message.receivers.contains(&viewer) {
        return Err(AppError::forbidden("caller is not a receiver of this message"));
    }
    if !message.deleted_by.insert(viewer) {
        return Err(AppError::already_deleted("message already deleted for this user"));
    }
    Ok(())
}

/// Marks every message in the conversation not authored by and not already
/// read by the viewer, bumping each message's last-activity so other members
/// pick up the read-state change on their next sync. One atomic batch;
/// repeated calls re-process nothing.
pub async fn mark_read(ctx: &AppContext, viewer: Uuid, conversation_id: Uuid) -> AppResult<u64> {
    let members = {
        let state = ctx.membership.read().await;
        let conversation = state.require_conversation(conversation_id)?;
        if !conversation.is_member(viewer) {
            return Err(AppError::forbidden("caller is not a conversation member"));
        }
        conversation.members.clone()
    };

    let marked = {
        let mut messages = ctx.messages.inner.write().await;
        let now = Utc::now();
        let mut marked = 0u64;
        for message in messages
            .values_mut()
            .filter(|m| m.conversation_id == conversation_id && m.unread_by(viewer))
        {
            message.read_by.insert(viewer);
            message.last_activity = now;
            marked += 1;
        }
        marked
    };

    // The viewer's unread count is now known exactly.
    ctx.unread.set_exact(conversation_id, viewer, 0).await;

    tracing::debug!(
        conversation_id = %conversation_id,
        marked,
        "Messages marked read"
    );

    fan_out(&ctx.notifier, members, EventKind::GeneralUpdate).await;
    Ok(marked)
}
