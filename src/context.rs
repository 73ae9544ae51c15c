use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::membership::MembershipStore;
use crate::messages::MessageStore;
use crate::notify::Notifier;
use crate::unread::UnreadCache;

/// Application context containing shared dependencies.
/// This reduces parameter passing and makes it easier to add new dependencies.
pub struct AppContext {
    pub config: Arc<Config>,
    pub membership: MembershipStore,
    pub messages: MessageStore,
    pub unread: UnreadCache,
    /// Injected fan-out capability; the engine never manages connections.
    pub notifier: Arc<dyn Notifier>,
}

impl AppContext {
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let unread_ttl = Duration::from_secs(config.unread_cache_ttl_secs);
        Self {
            config: Arc::new(config),
            membership: MembershipStore::new(),
            messages: MessageStore::new(),
            unread: UnreadCache::new(unread_ttl),
            notifier,
        }
    }
}
