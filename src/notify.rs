use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Event kinds pushed to connected clients. Delivery is at-most-once and
/// best-effort; a disconnected user reconciles by resyncing, not by relying
/// on the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[serde(rename = "notify")]
    GeneralUpdate,
    FriendRequest,
    GroupRequest,
    #[serde(rename = "kick_member")]
    Kicked,
    #[serde(rename = "group_modify")]
    GroupModified,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::GeneralUpdate => "notify",
            EventKind::FriendRequest => "friend_request",
            EventKind::GroupRequest => "group_request",
            EventKind::Kicked => "kick_member",
            EventKind::GroupModified => "group_modify",
        }
    }
}

/// Injected fan-out capability. The engine decides who to notify and with
/// what kind; how delivery happens is the implementor's concern.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: Uuid, kind: EventKind);
}

/// Notify every user in `users` with the same event kind.
pub async fn fan_out<I>(notifier: &Arc<dyn Notifier>, users: I, kind: EventKind)
where
    I: IntoIterator<Item = Uuid>,
{
    for user_id in users {
        notifier.notify(user_id, kind).await;
    }
}

// ============================================================================
// WebSocket session registry
// ============================================================================

struct Session {
    id: u64,
    tx: mpsc::UnboundedSender<EventKind>,
}

/// All live sessions of all connected users. A user may hold several
/// concurrent sessions (multiple devices/tabs); an event fans out to each.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Vec<Session>>>,
    next_session_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Registers a new session for `user_id` and returns its handle together
    /// with the receiving end of the event channel.
    pub async fn attach(&self, user_id: Uuid) -> (u64, mpsc::UnboundedReceiver<EventKind>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(Session { id: session_id, tx });
        tracing::debug!(user_id = %user_id, session_id, "Session attached");
        (session_id, rx)
    }

    pub async fn detach(&self, user_id: Uuid, session_id: u64) {
        let mut sessions = self.sessions.write().await;
        if let Some(list) = sessions.get_mut(&user_id) {
            list.retain(|s| s.id != session_id);
            if list.is_empty() {
                sessions.remove(&user_id);
            }
        }
        tracing::debug!(user_id = %user_id, session_id, "Session detached");
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.values().map(Vec::len).sum()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for SessionRegistry {
    async fn notify(&self, user_id: Uuid, kind: EventKind) {
        let sessions = self.sessions.read().await;
        let Some(list) = sessions.get(&user_id) else {
            return;
        };
        for session in list {
            // A send error means the session already hung up; the event is
            // simply dropped for it.
            let _ = session.tx.send(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_client_protocol() {
        assert_eq!(EventKind::GeneralUpdate.as_str(), "notify");
        assert_eq!(EventKind::Kicked.as_str(), "kick_member");
        assert_eq!(EventKind::GroupModified.as_str(), "group_modify");
        assert_eq!(
            serde_json::to_string(&EventKind::GroupRequest).unwrap(),
            "\"group_request\""
        );
    }

    #[tokio::test]
    async fn registry_fans_out_to_all_sessions_of_a_user() {
        let registry = SessionRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (_, mut rx_a1) = registry.attach(alice).await;
        let (_, mut rx_a2) = registry.attach(alice).await;
        let (_, mut rx_b) = registry.attach(bob).await;
        assert_eq!(registry.session_count().await, 3);

        registry.notify(alice, EventKind::GeneralUpdate).await;
        assert_eq!(rx_a1.try_recv().unwrap(), EventKind::GeneralUpdate);
        assert_eq!(rx_a2.try_recv().unwrap(), EventKind::GeneralUpdate);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn detach_removes_only_that_session() {
        let registry = SessionRegistry::new();
        let alice = Uuid::new_v4();

        let (id1, _rx1) = registry.attach(alice).await;
        let (_, mut rx2) = registry.attach(alice).await;

        registry.detach(alice, id1).await;
        assert_eq!(registry.session_count().await, 1);

        registry.notify(alice, EventKind::GroupRequest).await;
        assert_eq!(rx2.try_recv().unwrap(), EventKind::GroupRequest);
    }

    #[tokio::test]
    async fn notifying_an_offline_user_is_a_no_op() {
        let registry = SessionRegistry::new();
        registry.notify(Uuid::new_v4(), EventKind::Kicked).await;
        assert_eq!(registry.session_count().await, 0);
    }
}
