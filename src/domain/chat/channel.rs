//! Broker channel naming.
//!
//! Two kinds of channel exist: a private channel per user, named by a fixed
//! prefix plus the user id, and a single presence channel. Any other name is
//! a routing bug.

use std::fmt;
use thiserror::Error;

use crate::domain::foundation::UserId;

/// Prefix of every private per-user channel.
pub const PRIVATE_CHANNEL_PREFIX: &str = "user/";

/// The single well-known presence channel.
pub const PRESENCE_CHANNEL: &str = "user_attendance";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Unknown channel: {0}")]
    Unknown(String),
}

/// A broker channel this system publishes or subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Chat messages addressed to one user.
    Private(UserId),
    /// Presence events for everyone.
    Presence,
}

impl Channel {
    pub fn private(user: &UserId) -> Self {
        Channel::Private(user.clone())
    }

    /// Broker-level channel name.
    pub fn name(&self) -> String {
        match self {
            Channel::Private(user) => format!("{}{}", PRIVATE_CHANNEL_PREFIX, user),
            Channel::Presence => PRESENCE_CHANNEL.to_string(),
        }
    }

    /// Classifies a broker channel name.
    pub fn parse(name: &str) -> Result<Self, ChannelError> {
        if name == PRESENCE_CHANNEL {
            return Ok(Channel::Presence);
        }
        name.strip_prefix(PRIVATE_CHANNEL_PREFIX)
            .and_then(|user| UserId::new(user).ok())
            .map(Channel::Private)
            .ok_or_else(|| ChannelError::Unknown(name.to_string()))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
