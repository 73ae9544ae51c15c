use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::model::{
    Conversation, ConversationKind, ConversationView, Invitation, UserProfile,
};
use crate::notify::{fan_out, EventKind};

// ============================================================================
// Store
// ============================================================================

/// Authoritative conversation/member/role relation, plus the user directory
/// and pending group invitations.
///
/// A write-lock section is the transactional unit: every governance
/// transition runs its guard check and its mutation inside one, so two
/// concurrent privileged actors can never both succeed at a mutually
/// exclusive transition.
pub struct MembershipStore {
    inner: RwLock<MembershipState>,
}

#[derive(Default)]
pub struct MembershipState {
    pub users: HashMap<Uuid, UserProfile>,
    pub conversations: HashMap<Uuid, Conversation>,
    pub invitations: HashMap<Uuid, Invitation>,
}

impl MembershipStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MembershipState::default()),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, MembershipState> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, MembershipState> {
        self.inner.write().await
    }
}

impl Default for MembershipStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipState {
    pub fn require_profile(&self, user_id: Uuid) -> AppResult<&UserProfile> {
        self.users
            .get(&user_id)
            .ok_or_else(|| AppError::not_found(format!("user {} is not registered", user_id)))
    }

    pub fn require_conversation(&self, conversation_id: Uuid) -> AppResult<&Conversation> {
        self.conversations
            .get(&conversation_id)
            .ok_or_else(|| AppError::not_found("conversation does not exist"))
    }

    pub fn require_conversation_mut(
        &mut self,
        conversation_id: Uuid,
    ) -> AppResult<&mut Conversation> {
        self.conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| AppError::not_found("conversation does not exist"))
    }

    /// The direct conversation between the pair, regardless of active flag.
    /// Direct conversations are never hard-deleted, so there is at most one.
    pub fn direct_between(&self, a: Uuid, b: Uuid) -> Option<Uuid> {
        self.conversations
            .values()
            .find(|c| {
                c.kind == ConversationKind::Direct && c.is_member(a) && c.is_member(b)
            })
            .map(|c| c.id)
    }

    fn profile_or_placeholder(&self, user_id: Uuid) -> UserProfile {
        self.users.get(&user_id).cloned().unwrap_or(UserProfile {
            id: user_id,
            display_name: String::new(),
            avatar_url: String::new(),
        })
    }

    /// Serializes a conversation for `viewer`, resolving the display avatar
    /// by kind: the counterpart's avatar for a direct conversation, the
    /// conversation's own avatar for a group.
    pub fn view_for(&self, conversation: &Conversation, viewer: Uuid) -> ConversationView {
        let avatar_url = match conversation.kind {
            ConversationKind::Group => conversation.avatar_url.clone(),
            ConversationKind::Direct => conversation
                .members
                .iter()
                .find(|m| **m != viewer)
                .map(|m| self.profile_or_placeholder(*m).avatar_url)
                .unwrap_or_default(),
        };

        ConversationView {
            id: conversation.id,
            kind: conversation.kind,
            active: conversation.active,
            members: conversation
                .members
                .iter()
                .map(|m| self.profile_or_placeholder(*m))
                .collect(),
            host: conversation.host.map(|h| self.profile_or_placeholder(h)),
            admin_ids: conversation.admins.clone(),
            name: conversation.name.clone(),
            avatar_url,
            notices: conversation.notices.iter().map(Into::into).collect(),
            last_activity: crate::model::millis(conversation.last_activity),
        }
    }
}

// ============================================================================
// User directory
// ============================================================================

/// Registers or refreshes a profile. Called by the external identity service;
/// the engine itself never creates users.
pub async fn upsert_user(ctx: &AppContext, profile: UserProfile) -> AppResult<()> {
    if profile.display_name.trim().is_empty() {
        return Err(AppError::invalid("display_name must not be empty"));
    }
    let mut state = ctx.membership.write().await;
    state.users.insert(profile.id, profile);
    Ok(())
}

// ============================================================================
// Direct-conversation lifecycle (driven by the friendship workflow)
// ============================================================================

/// Creates the direct conversation for a new friendship pair. Re-friending a
/// previously unfriended pair reactivates the retired conversation instead,
/// preserving message history.
pub async fn create_direct(ctx: &AppContext, caller: Uuid, friend: Uuid) -> AppResult<ConversationView> {
    if caller == friend {
        return Err(AppError::invalid(
            "a direct conversation needs two distinct users",
        ));
    }

    let view = {
        let mut state = ctx.membership.write().await;
        state.require_profile(caller)?;
        state.require_profile(friend)?;

        if let Some(existing) = state.direct_between(caller, friend) {
            let conversation = state.require_conversation_mut(existing)?;
            if conversation.active {
                return Err(AppError::conflict("direct conversation already active"));
            }
            conversation.active = true;
            conversation.last_activity = Utc::now();
            tracing::info!(conversation_id = %existing, "Direct conversation reactivated");
            let conversation = state.require_conversation(existing)?;
            state.view_for(conversation, caller)
        } else {
            let conversation = Conversation {
                id: Uuid::new_v4(),
                kind: ConversationKind::Direct,
                active: true,
                members: vec![caller, friend],
                host: None,
                admins: Vec::new(),
                name: String::new(),
                avatar_url: String::new(),
                notices: Vec::new(),
                last_activity: Utc::now(),
            };
            tracing::info!(conversation_id = %conversation.id, "Direct conversation created");
            let view = state.view_for(&conversation, caller);
            state.conversations.insert(conversation.id, conversation);
            view
        }
    };

    fan_out(&ctx.notifier, [caller, friend], EventKind::FriendRequest).await;
    Ok(view)
}

/// Soft-disables the pair's direct conversation on unfriending. History is
/// kept; only new appends are rejected until reactivation.
pub async fn deactivate_direct(ctx: &AppContext, caller: Uuid, friend: Uuid) -> AppResult<()> {
    let members = {
        let mut state = ctx.membership.write().await;
        let id = state
            .direct_between(caller, friend)
            .ok_or_else(|| AppError::not_found("no direct conversation for this pair"))?;
        let conversation = state.require_conversation_mut(id)?;
        if !conversation.active {
            return Err(AppError::conflict("direct conversation already inactive"));
        }
        conversation.active = false;
        conversation.members.clone()
    };

    fan_out(&ctx.notifier, members, EventKind::GeneralUpdate).await;
    Ok(())
}

/// Re-enables a deactivated direct conversation on re-friending.
pub async fn reactivate_direct(ctx: &AppContext, caller: Uuid, friend: Uuid) -> AppResult<ConversationView> {
    let (view, members) = {
        let mut state = ctx.membership.write().await;
        let id = state
            .direct_between(caller, friend)
            .ok_or_else(|| AppError::not_found("no direct conversation for this pair"))?;
        let conversation = state.require_conversation_mut(id)?;
        if conversation.active {
            return Err(AppError::conflict("direct conversation already active"));
        }
        conversation.active = true;
        conversation.last_activity = Utc::now();
        let members = conversation.members.clone();
        let conversation = state.require_conversation(id)?;
        (state.view_for(conversation, caller), members)
    };

    fan_out(&ctx.notifier, members, EventKind::FriendRequest).await;
    Ok(view)
}

// ============================================================================
// Conversation queries
// ============================================================================

/// Ids of every conversation the user belongs to, active or not.
pub async fn conversation_ids(ctx: &AppContext, user_id: Uuid) -> Vec<Uuid> {
    let state = ctx.membership.read().await;
    let mut ids: Vec<Uuid> = state
        .conversations
        .values()
        .filter(|c| c.is_member(user_id))
        .map(|c| c.id)
        .collect();
    ids.sort();
    ids
}

/// Resolves the requested conversations for the viewer. Ids the viewer is
/// not a member of (or that do not exist) are silently skipped.
pub async fn conversations_view(
    ctx: &AppContext,
    viewer: Uuid,
    ids: &[Uuid],
) -> Vec<ConversationView> {
    let state = ctx.membership.read().await;
    ids.iter()
        .filter_map(|id| state.conversations.get(id))
        .filter(|c| c.is_member(viewer))
        .map(|c| state.view_for(c, viewer))
        .collect()
}

/// Validates that `sender` may append to the conversation and returns the
/// point-in-time member snapshot that becomes the message's receiver set.
pub async fn receiver_snapshot(
    ctx: &AppContext,
    sender: Uuid,
    conversation_id: Uuid,
) -> AppResult<Vec<Uuid>> {
    let state = ctx.membership.read().await;
    let conversation = state.require_conversation(conversation_id)?;
    if !conversation.is_member(sender) {
        return Err(AppError::forbidden("sender is not a conversation member"));
    }
    if !conversation.active {
        return Err(AppError::conflict("conversation is inactive"));
    }
    Ok(conversation.members.clone())
}
