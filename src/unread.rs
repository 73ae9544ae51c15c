use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::{AppError, AppResult};

struct Entry {
    value: u64,
    stored_at: Instant,
}

/// Time-bounded cache of unseen-message counts per (conversation, user).
///
/// Never a source of truth: a miss or an expired entry falls back to an
/// authoritative scan of the message store, so staleness only ever costs a
/// redundant recompute. Any component may invalidate; only `mark_read` and
/// the scan path write authoritative values.
pub struct UnreadCache {
    ttl: Duration,
    entries: RwLock<HashMap<(Uuid, Uuid), Entry>>,
}

impl UnreadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached count if present and not expired.
    pub async fn get(&self, conversation_id: Uuid, user_id: Uuid) -> Option<u64> {
        let entries = self.entries.read().await;
        entries
            .get(&(conversation_id, user_id))
            .filter(|e| e.stored_at.elapsed() <= self.ttl)
            .map(|e| e.value)
    }

    /// Stores a value known to be correct at this instant.
    pub async fn set_exact(&self, conversation_id: Uuid, user_id: Uuid, value: u64) {
        self.entries.write().await.insert(
            (conversation_id, user_id),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Increments the entry if one is cached and fresh; otherwise leaves the
    /// next read to recompute. Best-effort optimization for the append path.
    pub async fn bump(&self, conversation_id: Uuid, user_id: Uuid) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&(conversation_id, user_id)) {
            if entry.stored_at.elapsed() <= self.ttl {
                entry.value += 1;
            } else {
                entries.remove(&(conversation_id, user_id));
            }
        }
    }

    pub async fn invalidate(&self, conversation_id: Uuid, user_id: Uuid) {
        self.entries
            .write()
            .await
            .remove(&(conversation_id, user_id));
    }

    /// Drops every entry of a conversation; used when the conversation itself
    /// is deleted.
    pub async fn invalidate_conversation(&self, conversation_id: Uuid) {
        self.entries
            .write()
            .await
            .retain(|(conv, _), _| *conv != conversation_id);
    }
}

/// Count of messages in the conversation not sent by and not yet read by the
/// viewer. Served from the cache when fresh, otherwise recomputed from the
/// message store and re-cached.
pub async fn get_unread_count(
    ctx: &AppContext,
    viewer: Uuid,
    conversation_id: Uuid,
) -> AppResult<u64> {
    {
        let state = ctx.membership.read().await;
        let conversation = state
            .conversations
            .get(&conversation_id)
            .ok_or_else(|| AppError::not_found("conversation does not exist"))?;
        if !conversation.is_member(viewer) {
            return Err(AppError::forbidden("caller is not a conversation member"));
        }
    }

    if let Some(cached) = ctx.unread.get(conversation_id, viewer).await {
        return Ok(cached);
    }

    let count = ctx.messages.unread_scan(conversation_id, viewer).await;
    ctx.unread.set_exact(conversation_id, viewer, count).await;
    Ok(count)
}
