//! In-memory broker and presence store.
//!
//! Single-process stand-ins for Redis. Delivery is immediate and ordered:
//! a subscription receives messages in publish order across all of its
//! channels, which is what the integration tests rely on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::chat::Channel;
use crate::domain::foundation::UserId;
use crate::ports::{
    BrokerError, BrokerMessage, BrokerSubscription, MessageBroker, PresenceStore,
    PresenceStoreError,
};

type Subscribers = HashMap<String, Vec<(Uuid, mpsc::UnboundedSender<BrokerMessage>)>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock leaves plain collections in a usable state.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory publish/subscribe broker.
///
/// # Example
///
/// ```ignore
/// let broker = Arc::new(InMemoryBroker::new());
/// let mut sub = broker.subscribe(&[Channel::Presence]).await?;
/// broker.publish(&Channel::Presence, payload).await?;
///
/// assert_eq!(broker.published_count(), 1);
/// ```
#[derive(Default)]
pub struct InMemoryBroker {
    subscribers: Arc<Mutex<Subscribers>>,
    published: Mutex<Vec<BrokerMessage>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes on a raw channel name, bypassing `Channel` classification.
    ///
    /// Lets tests inject traffic on names a subscriber never asked for.
    pub fn publish_raw(&self, channel: &str, payload: &str) {
        let message = BrokerMessage::new(channel, payload);
        lock(&self.published).push(message.clone());

        let mut subscribers = lock(&self.subscribers);
        if let Some(senders) = subscribers.get_mut(channel) {
            senders.retain(|(_, tx)| tx.send(message.clone()).is_ok());
        }
    }

    /// Injects a message into every subscription that includes `listening_on`,
    /// labelled with an arbitrary channel name.
    pub fn inject(&self, listening_on: &Channel, channel_label: &str, payload: &str) {
        let message = BrokerMessage::new(channel_label, payload);
        let subscribers = lock(&self.subscribers);
        if let Some(senders) = subscribers.get(&listening_on.name()) {
            for (_, tx) in senders {
                let _ = tx.send(message.clone());
            }
        }
    }

    // === Test Helpers ===

    /// All messages published so far, in order.
    pub fn published_messages(&self) -> Vec<BrokerMessage> {
        lock(&self.published).clone()
    }

    /// Messages published on one channel.
    pub fn published_on(&self, channel: &Channel) -> Vec<BrokerMessage> {
        let name = channel.name();
        self.published_messages()
            .into_iter()
            .filter(|m| m.channel == name)
            .collect()
    }

    pub fn published_count(&self) -> usize {
        lock(&self.published).len()
    }

    /// Number of live subscriptions that include `channel`.
    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        lock(&self.subscribers)
            .get(&channel.name())
            .map(|senders| senders.iter().filter(|(_, tx)| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, channel: &Channel, payload: String) -> Result<(), BrokerError> {
        self.publish_raw(&channel.name(), &payload);
        Ok(())
    }

    async fn subscribe(
        &self,
        channels: &[Channel],
    ) -> Result<Box<dyn BrokerSubscription>, BrokerError> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let names: Vec<String> = channels.iter().map(Channel::name).collect();

        {
            let mut subscribers = lock(&self.subscribers);
            for name in &names {
                subscribers
                    .entry(name.clone())
                    .or_default()
                    .push((id, tx.clone()));
            }
        }

        Ok(Box::new(InMemorySubscription {
            id,
            channels: names,
            subscribers: Arc::clone(&self.subscribers),
            receiver: rx,
            subscribed: true,
        }))
    }
}

/// Subscription handed out by [`InMemoryBroker`].
pub struct InMemorySubscription {
    id: Uuid,
    channels: Vec<String>,
    subscribers: Arc<Mutex<Subscribers>>,
    receiver: mpsc::UnboundedReceiver<BrokerMessage>,
    subscribed: bool,
}

impl InMemorySubscription {
    fn release(&mut self) {
        let mut subscribers = lock(&self.subscribers);
        for name in &self.channels {
            if let Some(senders) = subscribers.get_mut(name) {
                senders.retain(|(id, _)| *id != self.id);
                if senders.is_empty() {
                    subscribers.remove(name);
                }
            }
        }
        self.receiver.close();
        self.subscribed = false;
    }
}

#[async_trait]
impl BrokerSubscription for InMemorySubscription {
    async fn next_message(&mut self) -> Option<BrokerMessage> {
        if !self.subscribed {
            return None;
        }
        self.receiver.recv().await
    }

    async fn unsubscribe(&mut self) -> Result<(), BrokerError> {
        if self.subscribed {
            self.release();
        }
        Ok(())
    }

    fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        if self.subscribed {
            self.release();
        }
    }
}

/// In-memory presence set. Keeps first-insertion order.
#[derive(Default)]
pub struct InMemoryPresenceStore {
    members: Mutex<Vec<UserId>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing members.
    pub fn with_members(members: impl IntoIterator<Item = UserId>) -> Self {
        let store = Self::new();
        {
            let mut guard = lock(&store.members);
            for member in members {
                if !guard.contains(&member) {
                    guard.push(member);
                }
            }
        }
        store
    }

    pub fn contains(&self, user: &UserId) -> bool {
        lock(&self.members).contains(user)
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn add_member(&self, user: &UserId) -> Result<bool, PresenceStoreError> {
        let mut members = lock(&self.members);
        if members.contains(user) {
            return Ok(false);
        }
        members.push(user.clone());
        Ok(true)
    }

    async fn remove_member(&self, user: &UserId) -> Result<bool, PresenceStoreError> {
        let mut members = lock(&self.members);
        let before = members.len();
        members.retain(|m| m != user);
        Ok(members.len() != before)
    }

    async fn members(&self) -> Result<Vec<UserId>, PresenceStoreError> {
        Ok(lock(&self.members).clone())
    }
}
