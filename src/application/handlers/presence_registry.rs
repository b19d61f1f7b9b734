//! PresenceRegistry - Membership of connected users plus its announcements.
//!
//! Every mutation is paired with its presence event. The pair runs under a
//! per-user lock, so two requests for the same user never interleave their
//! mutate and publish steps. Different users proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::chat::{codec, Channel, CodecError, PresenceEvent};
use crate::domain::foundation::UserId;
use crate::ports::{BrokerError, MessageBroker, PresenceStore, PresenceStoreError};

/// Errors from presence operations.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Presence store error: {0}")]
    Store(#[from] PresenceStoreError),

    #[error("Presence publish failed: {0}")]
    Broker(#[from] BrokerError),

    #[error("Presence event encoding failed: {0}")]
    Codec(#[from] CodecError),
}

/// Registry of online users.
pub struct PresenceRegistry {
    store: Arc<dyn PresenceStore>,
    broker: Arc<dyn MessageBroker>,
    locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl PresenceRegistry {
    pub fn new(store: Arc<dyn PresenceStore>, broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            store,
            broker,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Marks `user` online, announces it, and returns everyone online.
    ///
    /// A user already in the set is not announced a second time.
    pub async fn add(&self, user: &UserId) -> Result<Vec<UserId>, PresenceError> {
        let lock = self.user_lock(user);
        let members = {
            let _guard = lock.lock().await;

            // 1. Persist membership
            let added = self.store.add_member(user).await?;

            // 2. Announce
            if added {
                self.announce(PresenceEvent::add(user.clone())).await?;
            } else {
                tracing::debug!(user = %user, "User already online; add not re-announced");
            }

            // 3. Snapshot
            self.store.members().await?
        };
        drop(lock);
        self.prune_locks();

        Ok(members)
    }

    /// Marks `user` offline and announces it.
    ///
    /// Removing a user that is not online publishes nothing, which keeps
    /// repeated stream cleanups from double-announcing.
    pub async fn remove(&self, user: &UserId) -> Result<(), PresenceError> {
        let lock = self.user_lock(user);
        {
            let _guard = lock.lock().await;

            if self.store.remove_member(user).await? {
                self.announce(PresenceEvent::remove(user.clone())).await?;
            } else {
                tracing::debug!(user = %user, "User not online; remove not announced");
            }
        }
        drop(lock);
        self.prune_locks();

        Ok(())
    }

    /// Current membership snapshot.
    pub async fn members(&self) -> Result<Vec<UserId>, PresenceError> {
        Ok(self.store.members().await?)
    }

    async fn announce(&self, event: PresenceEvent) -> Result<(), PresenceError> {
        let payload = codec::encode_broker(&event)?;
        self.broker.publish(&Channel::Presence, payload).await?;
        tracing::debug!(user = %event.user, action = ?event.action, "Presence announced");
        Ok(())
    }

    fn user_lock(&self, user: &UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(user.clone()).or_default())
    }

    fn prune_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
