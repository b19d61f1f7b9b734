//! ChannelRouter - Turns broker traffic into frames for one user's stream.
//!
//! Each stream subscribes to the owner's private channel and the shared
//! presence channel. Chat payloads become unnamed `message` frames, presence
//! events become `user_attendance` frames. A presence event removing the
//! owner ends the stream with the stop id attached.
//!
//! Undecodable payloads are logged and skipped. A channel name the stream
//! never subscribed to is a routing bug and ends the stream with an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::adapters::sse::{LifecycleError, StreamError, StreamLifecycle, StreamWriter};
use crate::domain::chat::{codec, Channel, ChannelError, CodecError};
use crate::domain::foundation::UserId;
use crate::domain::stream::{Frame, STOP_RECONNECT_ID, USER_ATTENDANCE_EVENT};
use crate::ports::{BrokerError, BrokerMessage, BrokerSubscription, MessageBroker};

use super::presence_registry::PresenceRegistry;

type SharedSubscription = Arc<Mutex<Box<dyn BrokerSubscription>>>;

/// Errors that end a routed stream.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Protocol violation: {0}")]
    UnknownChannel(#[from] ChannelError),

    #[error("Protocol violation: private channel of {0} delivered to another user's stream")]
    ForeignChannel(String),

    #[error("Frame encoding failed: {0}")]
    Encoding(#[from] CodecError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// What to do with one broker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Write the frame and keep going.
    Frame(Frame),
    /// Unsubscribe, write the frame, and end the stream.
    Terminal(Frame),
    /// Nothing to write.
    Skip,
}

/// Classifies and encodes a broker message for `owner`'s stream.
pub fn route(owner: &UserId, message: &BrokerMessage) -> Result<Routed, RouteError> {
    match Channel::parse(&message.channel)? {
        Channel::Private(target) => {
            if &target != owner {
                return Err(RouteError::ForeignChannel(target.to_string()));
            }
            match codec::decode_chat(&message.payload) {
                Ok(payload) => Ok(Routed::Frame(Frame::data(codec::encode_wire(&payload)?))),
                Err(e) => {
                    tracing::warn!(user = %owner, channel = %message.channel, error = %e, "Skipping undecodable chat payload");
                    Ok(Routed::Skip)
                }
            }
        }
        Channel::Presence => match codec::decode_presence(&message.payload) {
            Ok(event) => {
                let frame = Frame::named(USER_ATTENDANCE_EVENT, codec::encode_wire(&event)?);
                if event.is_removal_of(owner) {
                    Ok(Routed::Terminal(frame.with_id(STOP_RECONNECT_ID)))
                } else {
                    Ok(Routed::Frame(frame))
                }
            }
            Err(e) => {
                tracing::warn!(user = %owner, error = %e, "Skipping undecodable presence payload");
                Ok(Routed::Skip)
            }
        },
    }
}

/// Subscribes streams and wires their cleanup.
pub struct ChannelRouter {
    broker: Arc<dyn MessageBroker>,
    registry: Arc<PresenceRegistry>,
}

impl ChannelRouter {
    pub fn new(broker: Arc<dyn MessageBroker>, registry: Arc<PresenceRegistry>) -> Self {
        Self { broker, registry }
    }

    /// Channels a stream owned by `user` listens on.
    pub fn channels_for(user: &UserId) -> [Channel; 2] {
        [Channel::private(user), Channel::Presence]
    }

    /// Subscribes for `user` and registers the stream's cleanup.
    ///
    /// The subscription is live when this returns.
    pub async fn attach(
        &self,
        user: UserId,
        lifecycle: &mut StreamLifecycle,
    ) -> Result<StreamProducer, RouteError> {
        let subscription = self.broker.subscribe(&Self::channels_for(&user)).await?;
        let subscription: SharedSubscription = Arc::new(Mutex::new(subscription));

        let cleanup = StreamCleanup {
            user: user.clone(),
            subscription: Arc::clone(&subscription),
            registry: Arc::clone(&self.registry),
            done: Arc::new(AtomicBool::new(false)),
        };
        lifecycle.on_close(move || async move { cleanup.run().await })?;

        tracing::debug!(user = %user, connection_id = %lifecycle.connection_id(), "Stream attached");

        Ok(StreamProducer { user, subscription })
    }
}

/// Producer loop for one stream.
pub struct StreamProducer {
    user: UserId,
    subscription: SharedSubscription,
}

impl std::fmt::Debug for StreamProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProducer")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl StreamProducer {
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Forwards broker messages to `writer` until the subscription ends or a
    /// terminal frame is written.
    pub async fn produce(self, writer: Arc<StreamWriter>) -> Result<(), RouteError> {
        loop {
            let next = self.subscription.lock().await.next_message().await;
            let Some(message) = next else {
                tracing::debug!(user = %self.user, "Subscription ended");
                return Ok(());
            };

            match route(&self.user, &message) {
                Ok(Routed::Frame(frame)) => writer.write(&frame).await?,
                Ok(Routed::Terminal(frame)) => {
                    self.subscription.lock().await.unsubscribe().await?;
                    writer.write(&frame).await?;
                    tracing::info!(user = %self.user, "Stream superseded; stop id sent");
                    return Ok(());
                }
                Ok(Routed::Skip) => {}
                Err(e) => {
                    tracing::error!(user = %self.user, channel = %message.channel, error = %e, "Routing failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Close-path cleanup for one stream. Runs its effects at most once.
#[derive(Clone)]
pub struct StreamCleanup {
    user: UserId,
    subscription: SharedSubscription,
    registry: Arc<PresenceRegistry>,
    done: Arc<AtomicBool>,
}

impl StreamCleanup {
    pub async fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut subscription = self.subscription.lock().await;
            if subscription.is_subscribed() {
                if let Err(e) = subscription.unsubscribe().await {
                    tracing::error!(user = %self.user, error = %e, "Unsubscribe on close failed");
                }
            }
        }

        if let Err(e) = self.registry.remove(&self.user).await {
            tracing::error!(user = %self.user, error = %e, "Presence removal on close failed");
        }
    }
}
