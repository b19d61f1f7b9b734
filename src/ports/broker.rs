//! MessageBroker port - Interface to the publish/subscribe substrate.
//!
//! Subscribers receive every message published on their channels after the
//! subscription was established. Nothing is replayed and nothing survives a
//! broker restart.

use async_trait::async_trait;

use crate::domain::chat::Channel;

/// Errors that can occur talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached or rejected the command.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The subscription was used after it had been released.
    #[error("Subscription already closed")]
    SubscriptionClosed,
}

/// A message as delivered by the broker, before any decoding.
///
/// The channel is kept as the raw broker name: classifying it is the
/// router's job, and an unexpected name there is a routing bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub channel: String,
    pub payload: String,
}

impl BrokerMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// A live subscription to one or more channels.
///
/// Held for the whole lifetime of one stream. Dropping it releases the
/// underlying resources even if `unsubscribe` was never called.
#[async_trait]
pub trait BrokerSubscription: Send {
    /// Waits for the next message on any subscribed channel.
    ///
    /// Returns `None` once the subscription is closed, either by
    /// `unsubscribe` or because the broker connection ended.
    async fn next_message(&mut self) -> Option<BrokerMessage>;

    /// Releases the subscription. Calling it again is a no-op.
    async fn unsubscribe(&mut self) -> Result<(), BrokerError>;

    /// True until `unsubscribe` succeeds or the connection ends.
    fn is_subscribed(&self) -> bool;
}

/// Port for publishing to and subscribing on broker channels.
///
/// # Example
///
/// ```ignore
/// let mut sub = broker.subscribe(&[Channel::private(&bob), Channel::Presence]).await?;
/// broker.publish(&Channel::private(&bob), payload).await?;
/// let message = sub.next_message().await;
/// ```
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes a payload on a channel.
    async fn publish(&self, channel: &Channel, payload: String) -> Result<(), BrokerError>;

    /// Subscribes to every channel in `channels` at once.
    ///
    /// When this returns, the subscription is active: anything published
    /// afterwards is delivered.
    async fn subscribe(&self, channels: &[Channel]) -> Result<Box<dyn BrokerSubscription>, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that traits are object-safe
    #[allow(dead_code)]
    fn assert_broker_object_safe(_: &dyn MessageBroker) {}

    #[allow(dead_code)]
    fn assert_subscription_object_safe(_: &dyn BrokerSubscription) {}

    #[test]
    fn broker_message_keeps_raw_channel() {
        let message = BrokerMessage::new("user/bob", "sender: alice\ntext: hi\n");
        assert_eq!(message.channel, "user/bob");
    }
}
