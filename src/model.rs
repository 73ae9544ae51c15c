use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Epoch-millisecond representation used for every timestamp on the wire and
/// for the activity cursor.
pub fn millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

// ============================================================================
// Users
// ============================================================================

/// Minimal profile registered by the external identity service. The engine
/// only needs it for member serialization and display-avatar resolution;
/// credentials never reach this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
}

// ============================================================================
// Conversations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Direct,
    Group,
}

/// Governance state of a user within a group conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Admin,
    Member,
}

/// Announcement posted to a group by its host or an admin. Author details are
/// denormalized at posting time so the notice survives profile changes.
#[derive(Debug, Clone)]
pub struct GroupNotice {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_avatar: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    /// Soft-disable flag; a deactivated direct conversation rejects appends
    /// but keeps its message history for reactivation.
    pub active: bool,
    /// Ordered member set. For direct conversations this is the fixed
    /// two-party edge; for groups it is the unit governance mutates.
    pub members: Vec<Uuid>,
    /// Sole owner of a group conversation; `None` for direct conversations.
    pub host: Option<Uuid>,
    /// Delegated privileged members; always disjoint from the host.
    pub admins: Vec<Uuid>,
    pub name: String,
    pub avatar_url: String,
    pub notices: Vec<GroupNotice>,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }

    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn is_host(&self, user_id: Uuid) -> bool {
        self.host == Some(user_id)
    }

    /// Host or admin: may invite directly, accept invitations, kick plain
    /// members and post notices.
    pub fn is_privileged(&self, user_id: Uuid) -> bool {
        self.is_host(user_id) || self.is_admin(user_id)
    }

    pub fn role_of(&self, user_id: Uuid) -> Option<Role> {
        if !self.is_member(user_id) {
            None
        } else if self.is_host(user_id) {
            Some(Role::Host)
        } else if self.is_admin(user_id) {
            Some(Role::Admin)
        } else {
            Some(Role::Member)
        }
    }

    pub fn remove_member(&mut self, user_id: Uuid) {
        self.members.retain(|m| *m != user_id);
        self.admins.retain(|a| *a != user_id);
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Uuid,
    pub body: String,
    /// Immutable creation time.
    pub sent_at: DateTime<Utc>,
    /// Mutable ordering/cursor key; bumped on reply and on read-state change
    /// so the message reappears in incremental sync.
    pub last_activity: DateTime<Utc>,
    /// Reply target in the same conversation, fixed at creation time.
    pub reply_to: Option<Uuid>,
    pub reply_count: u32,
    /// Point-in-time snapshot of the member set at send time; later
    /// membership changes never grant or revoke visibility retroactively.
    pub receivers: HashSet<Uuid>,
    pub read_by: HashSet<Uuid>,
    /// Per-user tombstones; hide the message for that viewer only.
    pub deleted_by: HashSet<Uuid>,
}

impl Message {
    pub fn visible_to(&self, viewer: Uuid) -> bool {
        self.receivers.contains(&viewer) && !self.deleted_by.contains(&viewer)
    }

    /// Unread from this viewer's perspective: not their own and not yet read.
    pub fn unread_by(&self, viewer: Uuid) -> bool {
        self.sender != viewer && !self.read_by.contains(&viewer)
    }
}

// ============================================================================
// Invitations
// ============================================================================

/// Pending request created when a non-privileged member tries to add someone
/// to a group; consumed when a host/admin accepts it.
#[derive(Debug, Clone)]
pub struct Invitation {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Uuid,
    pub receiver: Uuid,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Wire views
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub sent_at: i64,
    pub last_activity: i64,
    pub reply_to: Option<Uuid>,
    pub reply_count: u32,
    pub read_by: Vec<Uuid>,
}

impl From<&Message> for MessageView {
    fn from(m: &Message) -> Self {
        let mut read_by: Vec<Uuid> = m.read_by.iter().copied().collect();
        read_by.sort();
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender,
            body: m.body.clone(),
            sent_at: millis(m.sent_at),
            last_activity: millis(m.last_activity),
            reply_to: m.reply_to,
            reply_count: m.reply_count,
            read_by,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NoticeView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_avatar: String,
    pub content: String,
    pub posted_at: i64,
}

impl From<&GroupNotice> for NoticeView {
    fn from(n: &GroupNotice) -> Self {
        Self {
            id: n.id,
            author_id: n.author_id,
            author_name: n.author_name.clone(),
            author_avatar: n.author_avatar.clone(),
            content: n.content.clone(),
            posted_at: millis(n.posted_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub active: bool,
    pub members: Vec<UserProfile>,
    pub host: Option<UserProfile>,
    pub admin_ids: Vec<Uuid>,
    pub name: String,
    /// Display avatar resolved by kind: the counterpart's avatar for a
    /// direct conversation, the conversation's own avatar for a group.
    pub avatar_url: String,
    pub notices: Vec<NoticeView>,
    pub last_activity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitationView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub conversation_name: String,
    pub conversation_avatar: String,
    pub sender: UserProfile,
    pub receiver: UserProfile,
    pub created_at: i64,
}
