//! SendMessageHandler - Publishes a chat message to its receiver.

use std::sync::Arc;

use crate::domain::chat::{codec, Channel, ChatMessage, CodecError};
use crate::domain::foundation::{UserId, ValidationError};
use crate::ports::{BrokerError, MessageBroker};

/// Command to send a message.
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub sender: UserId,
    pub receiver: UserId,
    pub text: String,
}

impl SendMessageCommand {
    pub fn new(sender: UserId, receiver: UserId, text: impl Into<String>) -> Self {
        Self {
            sender,
            receiver,
            text: text.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendMessageError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Encoding error: {0}")]
    Codec(#[from] CodecError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// Handler for `send`. Touches only the broker, never the presence set.
pub struct SendMessageHandler {
    broker: Arc<dyn MessageBroker>,
}

impl SendMessageHandler {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self { broker }
    }

    pub async fn handle(&self, cmd: SendMessageCommand) -> Result<ChatMessage, SendMessageError> {
        // 1. Validate
        let message = ChatMessage::new(cmd.sender, cmd.receiver, cmd.text)?;

        // 2. Publish to the receiver's private channel
        let payload = codec::encode_broker(&message.payload())?;
        self.broker
            .publish(&Channel::private(&message.receiver), payload)
            .await?;

        tracing::debug!(sender = %message.sender, receiver = %message.receiver, "Message published");
        Ok(message)
    }
}
