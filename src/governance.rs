use chrono::Utc;
use uuid::Uuid;

use crate::config::MAX_GROUP_NAME_LEN;
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::membership::MembershipState;
use crate::model::{
    Conversation, ConversationKind, ConversationView, GroupNotice, Invitation, InvitationView,
    NoticeView,
};
use crate::notify::{fan_out, EventKind};

// ============================================================================
// Group creation
// ============================================================================

/// Comma-joined member names, truncated when they exceed the display limit.
fn auto_group_name(names: &[String]) -> String {
    let joined = names.join(", ");
    if joined.chars().count() > MAX_GROUP_NAME_LEN {
        let truncated: String = joined.chars().take(MAX_GROUP_NAME_LEN - 3).collect();
        format!("{}...", truncated)
    } else {
        joined
    }
}

/// Creates a group conversation. The creator becomes host; the initial
/// invitee list becomes the plain member set.
pub async fn create_group(
    ctx: &AppContext,
    creator: Uuid,
    member_ids: Vec<Uuid>,
    name: Option<String>,
) -> AppResult<ConversationView> {
    let mut invitees: Vec<Uuid> = Vec::new();
    for id in member_ids {
        if id != creator && !invitees.contains(&id) {
            invitees.push(id);
        }
    }
    if invitees.is_empty() {
        return Err(AppError::invalid("a group needs at least one other member"));
    }

    let (view, members) = {
        let mut state = ctx.membership.write().await;
        state.require_profile(creator)?;
        for id in &invitees {
            state.require_profile(*id)?;
        }

        let mut members = invitees.clone();
        members.push(creator);

        // Only auto-generated names are truncated; an explicit name is kept
        // as given.
        let name = match name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            Some(explicit) => explicit,
            None => {
                let names: Vec<String> = members
                    .iter()
                    .map(|m| state.require_profile(*m).map(|p| p.display_name.clone()))
                    .collect::<AppResult<_>>()?;
                auto_group_name(&names)
            }
        };

        let conversation = Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Group,
            active: true,
            members: members.clone(),
            host: Some(creator),
            admins: Vec::new(),
            name,
            avatar_url: ctx.config.default_group_avatar_url.clone(),
            notices: Vec::new(),
            last_activity: Utc::now(),
        };
        tracing::info!(
            conversation_id = %conversation.id,
            member_count = members.len(),
            "Group conversation created"
        );
        let view = state.view_for(&conversation, creator);
        state.conversations.insert(conversation.id, conversation);
        (view, members)
    };

    fan_out(&ctx.notifier, members, EventKind::GeneralUpdate).await;
    Ok(view)
}

// ============================================================================
// Invitations
// ============================================================================

#[derive(Debug)]
pub enum InviteOutcome {
    /// The actor was privileged; the invitees joined directly.
    Added(ConversationView),
    /// The actor was a plain member; invitations now await a host/admin.
    Pending(Vec<InvitationView>),
}

fn invitation_view(state: &MembershipState, invitation: &Invitation) -> AppResult<InvitationView> {
    let conversation = state.require_conversation(invitation.conversation_id)?;
    Ok(InvitationView {
        id: invitation.id,
        conversation_id: conversation.id,
        conversation_name: conversation.name.clone(),
        conversation_avatar: conversation.avatar_url.clone(),
        sender: state.require_profile(invitation.sender)?.clone(),
        receiver: state.require_profile(invitation.receiver)?.clone(),
        created_at: crate::model::millis(invitation.created_at),
    })
}

/// Adds users to a group. A host or admin adds them directly; a plain member
/// creates pending invitations instead.
pub async fn invite(
    ctx: &AppContext,
    actor: Uuid,
    conversation_id: Uuid,
    invitee_ids: Vec<Uuid>,
) -> AppResult<InviteOutcome> {
    let mut invitees: Vec<Uuid> = Vec::new();
    for id in invitee_ids {
        if !invitees.contains(&id) {
            invitees.push(id);
        }
    }
    if invitees.is_empty() {
        return Err(AppError::invalid("invitee list must not be empty"));
    }

    enum Mutation {
        Added(ConversationView, Vec<Uuid>),
        Pending(Vec<InvitationView>, Vec<Uuid>),
    }

    let mutation = {
        let mut state = ctx.membership.write().await;
        let conversation = state.require_conversation(conversation_id)?;
        if conversation.kind != ConversationKind::Group {
            return Err(AppError::invalid("not a group conversation"));
        }
        if !conversation.is_member(actor) {
            return Err(AppError::forbidden("caller is not a group member"));
        }
        for id in &invitees {
            state.require_profile(*id)?;
            if state.require_conversation(conversation_id)?.is_member(*id) {
                return Err(AppError::conflict("user is already a group member"));
            }
        }

        if state.require_conversation(conversation_id)?.is_privileged(actor) {
            let conversation = state.require_conversation_mut(conversation_id)?;
            conversation.members.extend(invitees.iter().copied());
            conversation.last_activity = Utc::now();
            let members = conversation.members.clone();
            let conversation = state.require_conversation(conversation_id)?;
            Mutation::Added(state.view_for(conversation, actor), members)
        } else {
            let now = Utc::now();
            let mut views = Vec::new();
            for receiver in &invitees {
                let invitation = Invitation {
                    id: Uuid::new_v4(),
                    conversation_id,
                    sender: actor,
                    receiver: *receiver,
                    created_at: now,
                };
                views.push(invitation_view(&state, &invitation)?);
                state.invitations.insert(invitation.id, invitation);
            }
            let conversation = state.require_conversation(conversation_id)?;
            let mut approvers = conversation.admins.clone();
            if let Some(host) = conversation.host {
                approvers.push(host);
            }
            Mutation::Pending(views, approvers)
        }
    };

    match mutation {
        Mutation::Added(view, members) => {
            fan_out(&ctx.notifier, members, EventKind::GeneralUpdate).await;
            Ok(InviteOutcome::Added(view))
        }
        Mutation::Pending(views, approvers) => {
            fan_out(&ctx.notifier, approvers, EventKind::GroupRequest).await;
            Ok(InviteOutcome::Pending(views))
        }
    }
}

/// Accepts a pending invitation: the invited user joins, and every pending
/// invitation for that (conversation, receiver) pair is cleared atomically,
/// not just the accepted one.
pub async fn accept_invitation(
    ctx: &AppContext,
    actor: Uuid,
    invitation_id: Uuid,
) -> AppResult<ConversationView> {
    let (view, members) = {
        let mut state = ctx.membership.write().await;
        let invitation = state
            .invitations
            .get(&invitation_id)
            .cloned()
            .ok_or_else(|| AppError::conflict("invitation no longer exists"))?;

        let conversation = state.require_conversation(invitation.conversation_id)?;
        if !conversation.is_privileged(actor) {
            return Err(AppError::forbidden(
                "only the host or an admin may accept invitations",
            ));
        }

        let conversation = state.require_conversation_mut(invitation.conversation_id)?;
        if !conversation.is_member(invitation.receiver) {
            conversation.members.push(invitation.receiver);
        }
        conversation.last_activity = Utc::now();
        let members = conversation.members.clone();

        state.invitations.retain(|_, i| {
            !(i.conversation_id == invitation.conversation_id
                && i.receiver == invitation.receiver)
        });

        let conversation = state.require_conversation(invitation.conversation_id)?;
        (state.view_for(conversation, actor), members)
    };

    fan_out(&ctx.notifier, members, EventKind::GroupRequest).await;
    Ok(view)
}

/// Pending invitations of every group the user hosts or administers.
pub async fn pending_invitations(ctx: &AppContext, user_id: Uuid) -> AppResult<Vec<InvitationView>> {
    let state = ctx.membership.read().await;
    let mut views = Vec::new();
    for invitation in state.invitations.values() {
        let conversation = state.require_conversation(invitation.conversation_id)?;
        if conversation.is_privileged(user_id) {
            views.push(invitation_view(&state, invitation)?);
        }
    }
    views.sort_by_key(|v| (v.created_at, v.id));
    Ok(views)
}

// ============================================================================
// Role transitions
// ============================================================================

/// Guard-then-mutate helper: runs `f` on the conversation under the store's
/// write lock and fans out `event` to the returned recipients afterwards.
async fn transition<F>(
    ctx: &AppContext,
    conversation_id: Uuid,
    actor: Uuid,
    event: EventKind,
    f: F,
) -> AppResult<ConversationView>
where
    F: FnOnce(&mut Conversation) -> AppResult<Vec<Uuid>>,
{
    let (view, recipients) = {
        let mut state = ctx.membership.write().await;
        let conversation = state.require_conversation_mut(conversation_id)?;
        if conversation.kind != ConversationKind::Group {
            return Err(AppError::invalid("not a group conversation"));
        }
        let recipients = f(conversation)?;
        let conversation = state.require_conversation(conversation_id)?;
        (state.view_for(conversation, actor), recipients)
    };

    fan_out(&ctx.notifier, recipients, event).await;
    Ok(view)
}

/// Transfers ownership. The new host must already be a member and loses any
/// admin status: host and admin are mutually exclusive.
pub async fn set_host(
    ctx: &AppContext,
    actor: Uuid,
    conversation_id: Uuid,
    new_host: Uuid,
) -> AppResult<ConversationView> {
    transition(ctx, conversation_id, actor, EventKind::GeneralUpdate, |c| {
        if !c.is_host(actor) {
            return Err(AppError::forbidden("only the current host may transfer ownership"));
        }
        if actor == new_host {
            return Err(AppError::conflict("new host must differ from the current host"));
        }
        if !c.is_member(new_host) {
            return Err(AppError::not_found("new host is not a group member"));
        }
        c.host = Some(new_host);
        c.admins.retain(|a| *a != new_host);
        Ok(c.members.clone())
    })
    .await
}

/// Delegates admin to a plain member. Host only.
pub async fn set_admin(
    ctx: &AppContext,
    actor: Uuid,
    conversation_id: Uuid,
    target: Uuid,
) -> AppResult<ConversationView> {
    transition(ctx, conversation_id, actor, EventKind::GeneralUpdate, |c| {
        if !c.is_host(actor) {
            return Err(AppError::forbidden("only the host may appoint admins"));
        }
        if !c.is_member(target) {
            return Err(AppError::not_found("target is not a group member"));
        }
        if c.is_admin(target) || c.is_host(target) {
            return Err(AppError::conflict("target already holds a privileged role"));
        }
        c.admins.push(target);
        Ok(c.members.clone())
    })
    .await
}

/// Demotes an admin back to plain member. Host only.
pub async fn remove_admin(
    ctx: &AppContext,
    actor: Uuid,
    conversation_id: Uuid,
    target: Uuid,
) -> AppResult<ConversationView> {
    transition(ctx, conversation_id, actor, EventKind::GeneralUpdate, |c| {
        if !c.is_host(actor) {
            return Err(AppError::forbidden("only the host may remove admins"));
        }
        if !c.is_member(target) {
            return Err(AppError::not_found("target is not a group member"));
        }
        if !c.is_admin(target) {
            return Err(AppError::conflict("target is not an admin"));
        }
        c.admins.retain(|a| *a != target);
        Ok(c.members.clone())
    })
    .await
}

/// Removes a member. The host cannot be kicked; an admin can only be kicked
/// by the host, never by another admin or by themselves.
pub async fn kick(
    ctx: &AppContext,
    actor: Uuid,
    conversation_id: Uuid,
    target: Uuid,
) -> AppResult<ConversationView> {
    transition(ctx, conversation_id, actor, EventKind::Kicked, |c| {
        if !c.is_privileged(actor) {
            return Err(AppError::forbidden("only the host or an admin may kick members"));
        }
        if !c.is_member(target) {
            return Err(AppError::not_found("target is not a group member"));
        }
        if c.is_host(target) {
            return Err(AppError::forbidden("the host cannot be kicked"));
        }
        if c.is_admin(target) && !c.is_host(actor) {
            return Err(AppError::forbidden("only the host may kick an admin"));
        }
        c.remove_member(target);
        // Post-mutation snapshot plus the removed user, who is no longer in it.
        let mut recipients = c.members.clone();
        recipients.push(target);
        Ok(recipients)
    })
    .await
}

/// Leaves a group. The host may only leave as the last remaining member, in
/// which case the conversation and its messages are deleted outright.
pub async fn exit_group(ctx: &AppContext, actor: Uuid, conversation_id: Uuid) -> AppResult<()> {
    enum Exit {
        Left(Vec<Uuid>),
        Deleted,
    }

    let outcome = {
        let mut state = ctx.membership.write().await;
        let conversation = state.require_conversation_mut(conversation_id)?;
        if conversation.kind != ConversationKind::Group {
            return Err(AppError::invalid("not a group conversation"));
        }
        if !conversation.is_member(actor) {
            return Err(AppError::forbidden("caller is not a group member"));
        }
        if conversation.is_host(actor) && conversation.members.len() > 1 {
            return Err(AppError::forbidden(
                "the host must transfer ownership before leaving",
            ));
        }

        conversation.remove_member(actor);
        if conversation.members.is_empty() {
            state.conversations.remove(&conversation_id);
            state
                .invitations
                .retain(|_, i| i.conversation_id != conversation_id);
            tracing::info!(conversation_id = %conversation_id, "Empty group deleted");
            Exit::Deleted
        } else {
            let mut recipients = conversation.members.clone();
            recipients.push(actor);
            Exit::Left(recipients)
        }
    };

    match outcome {
        Exit::Left(recipients) => {
            fan_out(&ctx.notifier, recipients, EventKind::GeneralUpdate).await;
        }
        Exit::Deleted => {
            ctx.messages.purge_conversation(conversation_id).await;
            ctx.unread.invalidate_conversation(conversation_id).await;
            fan_out(&ctx.notifier, [actor], EventKind::GeneralUpdate).await;
        }
    }
    Ok(())
}

// ============================================================================
// Group notices
// ============================================================================

/// Posts an announcement to a group. Host or admin only.
pub async fn post_notice(
    ctx: &AppContext,
    actor: Uuid,
    conversation_id: Uuid,
    content: String,
) -> AppResult<NoticeView> {
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::invalid("notice content must not be empty"));
    }

    let (view, members) = {
        let mut state = ctx.membership.write().await;
        let author = state.require_profile(actor)?.clone();
        let conversation = state.require_conversation_mut(conversation_id)?;
        if conversation.kind != ConversationKind::Group {
            return Err(AppError::invalid("not a group conversation"));
        }
        if !conversation.is_privileged(actor) {
            return Err(AppError::forbidden("only the host or an admin may post notices"));
        }

        let notice = GroupNotice {
            id: Uuid::new_v4(),
            author_id: author.id,
            author_name: author.display_name,
            author_avatar: author.avatar_url,
            content,
            posted_at: Utc::now(),
        };
        let view = NoticeView::from(&notice);
        conversation.notices.push(notice);
        conversation.last_activity = Utc::now();
        (view, conversation.members.clone())
    };

    fan_out(&ctx.notifier, members, EventKind::GroupModified).await;
    Ok(view)
}
