//! Chat message value objects.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{UserId, ValidationError};

/// Maximum allowed message length (10,000 characters).
pub const MAX_MESSAGE_LENGTH: usize = 10_000;

/// A message from one user to another, as both clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: UserId,
    pub receiver: UserId,
    pub text: String,
}

impl ChatMessage {
    /// Creates a validated chat message.
    pub fn new(sender: UserId, receiver: UserId, text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        validate_text(&text)?;
        Ok(Self {
            sender,
            receiver,
            text,
        })
    }

    /// The broker payload for this message. The receiver is implied by the
    /// private channel it is published on.
    pub fn payload(&self) -> ChatPayload {
        ChatPayload {
            sender: self.sender.clone(),
            text: self.text.clone(),
        }
    }
}

/// Chat message as carried on a receiver's private channel and in
/// `message` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatPayload {
    pub sender: UserId,
    pub text: String,
}

impl ChatPayload {
    /// Re-attaches the receiver the payload was delivered to.
    pub fn into_message(self, receiver: UserId) -> ChatMessage {
        ChatMessage {
            sender: self.sender,
            receiver,
            text: self.text,
        }
    }
}

/// Validates message text: non-empty, at most [`MAX_MESSAGE_LENGTH`] chars.
pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.is_empty() {
        return Err(ValidationError::empty_field("text"));
    }
    let length = text.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::too_long("text", MAX_MESSAGE_LENGTH, length));
    }
    Ok(())
}
