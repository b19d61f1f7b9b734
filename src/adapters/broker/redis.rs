//! Redis-backed broker and presence store for production deployments.
//!
//! Publishing and the presence set share one multiplexed connection. Every
//! subscription opens its own dedicated pub/sub connection, because a Redis
//! connection in subscribe mode cannot issue regular commands.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSub};
use redis::AsyncCommands;

use crate::domain::chat::Channel;
use crate::domain::foundation::UserId;
use crate::ports::{
    BrokerError, BrokerMessage, BrokerSubscription, MessageBroker, PresenceStore,
    PresenceStoreError,
};

fn unavailable(e: redis::RedisError) -> BrokerError {
    BrokerError::Unavailable(e.to_string())
}

/// Redis PUBLISH/SUBSCRIBE broker.
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisBroker {
    pub fn new(client: redis::Client, conn: MultiplexedConnection) -> Self {
        Self { client, conn }
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn publish(&self, channel: &Channel, payload: String) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn
            .publish(channel.name(), payload)
            .await
            .map_err(unavailable)?;

        tracing::trace!(channel = %channel, receivers, "Published to broker");
        Ok(())
    }

    async fn subscribe(
        &self,
        channels: &[Channel],
    ) -> Result<Box<dyn BrokerSubscription>, BrokerError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(unavailable)?;
        let names: Vec<String> = channels.iter().map(Channel::name).collect();

        for name in &names {
            pubsub.subscribe(name).await.map_err(unavailable)?;
        }

        tracing::debug!(channels = ?names, "Subscribed to broker channels");

        Ok(Box::new(RedisSubscription {
            pubsub: Some(pubsub),
            channels: names,
        }))
    }
}

/// One dedicated pub/sub connection.
///
/// The connection is dropped on unsubscribe, which also frees it on the
/// server side.
pub struct RedisSubscription {
    pubsub: Option<PubSub>,
    channels: Vec<String>,
}

#[async_trait]
impl BrokerSubscription for RedisSubscription {
    async fn next_message(&mut self) -> Option<BrokerMessage> {
        loop {
            let next = match self.pubsub.as_mut() {
                Some(pubsub) => pubsub.on_message().next().await,
                None => return None,
            };

            let Some(msg) = next else {
                tracing::warn!(channels = ?self.channels, "Broker connection ended");
                self.pubsub = None;
                return None;
            };

            match msg.get_payload::<String>() {
                Ok(payload) => {
                    return Some(BrokerMessage::new(msg.get_channel_name(), payload));
                }
                Err(e) => {
                    tracing::warn!(
                        channel = msg.get_channel_name(),
                        error = %e,
                        "Skipping non-text broker payload"
                    );
                }
            }
        }
    }

    async fn unsubscribe(&mut self) -> Result<(), BrokerError> {
        let Some(mut pubsub) = self.pubsub.take() else {
            return Ok(());
        };

        for name in &self.channels {
            if let Err(e) = pubsub.unsubscribe(name).await {
                // The connection is dropped below either way.
                tracing::warn!(channel = %name, error = %e, "Unsubscribe failed");
            }
        }

        tracing::debug!(channels = ?self.channels, "Unsubscribed from broker channels");
        Ok(())
    }

    fn is_subscribed(&self) -> bool {
        self.pubsub.is_some()
    }
}

/// Presence set stored as a Redis SET.
#[derive(Clone)]
pub struct RedisPresenceStore {
    conn: MultiplexedConnection,
    key: String,
}

impl RedisPresenceStore {
    pub fn new(conn: MultiplexedConnection, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn add_member(&self, user: &UserId) -> Result<bool, PresenceStoreError> {
        let mut conn = self.conn.clone();
        let added: i64 = conn
            .sadd(&self.key, user.as_str())
            .await
            .map_err(|e: redis::RedisError| PresenceStoreError::Unavailable(e.to_string()))?;
        Ok(added > 0)
    }

    async fn remove_member(&self, user: &UserId) -> Result<bool, PresenceStoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .srem(&self.key, user.as_str())
            .await
            .map_err(|e: redis::RedisError| PresenceStoreError::Unavailable(e.to_string()))?;
        Ok(removed > 0)
    }

    async fn members(&self) -> Result<Vec<UserId>, PresenceStoreError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn
            .smembers(&self.key)
            .await
            .map_err(|e: redis::RedisError| PresenceStoreError::Unavailable(e.to_string()))?;

        raw.into_iter()
            .map(|id| UserId::new(id.clone()).map_err(|_| PresenceStoreError::Corrupt(id)))
            .collect()
    }
}
