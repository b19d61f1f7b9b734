//! Presence events published on login and disconnect.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::UserId;

/// Whether a user joined or left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    Add,
    Remove,
}

impl fmt::Display for PresenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceAction::Add => write!(f, "add"),
            PresenceAction::Remove => write!(f, "remove"),
        }
    }
}

/// `{user, action}` as published on the presence channel and carried by
/// `user_attendance` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub user: UserId,
    pub action: PresenceAction,
}

impl PresenceEvent {
    pub fn add(user: UserId) -> Self {
        Self {
            user,
            action: PresenceAction::Add,
        }
    }

    pub fn remove(user: UserId) -> Self {
        Self {
            user,
            action: PresenceAction::Remove,
        }
    }

    /// True when this event removes `user`, i.e. the stream owned by `user`
    /// has been superseded elsewhere.
    pub fn is_removal_of(&self, user: &UserId) -> bool {
        self.action == PresenceAction::Remove && &self.user == user
    }
}
