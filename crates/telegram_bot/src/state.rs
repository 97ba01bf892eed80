use std::{collections::HashMap, sync::Arc, time::Duration};

use teloxide::types::ChatId;
use tokio::{sync::Mutex, time::Instant};

pub(crate) const DEFAULT_LOGIN_TTL: Duration = Duration::from_secs(600);

/// Chats waiting for an email address after `/login`.
///
/// Entries expire `ttl` after creation; an expired entry behaves as absent
/// and is purged on the next access.
#[derive(Clone)]
pub(crate) struct SessionStore {
    ttl: Duration,
    pending: Arc<Mutex<HashMap<ChatId, Instant>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_TTL)
    }
}

impl SessionStore {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn purge(pending: &mut HashMap<ChatId, Instant>) {
        let now = Instant::now();
        pending.retain(|_, deadline| *deadline > now);
    }

    /// Starts a pending login. Returns `false` when one is already running.
    pub(crate) async fn begin_login(&self, chat_id: ChatId) -> bool {
        let mut guard = self.pending.lock().await;
        Self::purge(&mut guard);
        if guard.contains_key(&chat_id) {
            return false;
        }
        guard.insert(chat_id, Instant::now() + self.ttl);
        true
    }

    pub(crate) async fn is_pending(&self, chat_id: ChatId) -> bool {
        let mut guard = self.pending.lock().await;
        Self::purge(&mut guard);
        guard.contains_key(&chat_id)
    }

    /// Ends a pending login. Returns `false` when there was none.
    pub(crate) async fn end_login(&self, chat_id: ChatId) -> bool {
        let mut guard = self.pending.lock().await;
        Self::purge(&mut guard);
        guard.remove(&chat_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn login_lifecycle() {
        let store = SessionStore::default();
        let chat = ChatId(7);

        assert!(!store.is_pending(chat).await);
        assert!(store.begin_login(chat).await);
        assert!(!store.begin_login(chat).await);
        assert!(store.is_pending(chat).await);
        assert!(!store.is_pending(ChatId(8)).await);

        assert!(store.end_login(chat).await);
        assert!(!store.end_login(chat).await);
        assert!(!store.is_pending(chat).await);
    }

    #[tokio::test]
    async fn expired_logins_are_absent() {
        let store = SessionStore::new(Duration::ZERO);
        let chat = ChatId(7);

        assert!(store.begin_login(chat).await);
        assert!(!store.is_pending(chat).await);
        assert!(!store.end_login(chat).await);
        // A new login can start right away.
        assert!(store.begin_login(chat).await);
    }
}
