//! Per-peer message history held by a logged-in client.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::chat::ChatMessage;
use crate::domain::foundation::{Reducer, Transition, UserId};

/// A message plus whether the local user has seen it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(flatten)]
    pub message: ChatMessage,
    pub is_read: bool,
}

/// Transitions of the message box.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBoxAction {
    /// Reset to empty (logout).
    Init,
    /// A message arrived from `message.sender`; stored unread.
    Receive { message: ChatMessage },
    /// The local user sent `message`; stored read under `message.receiver`.
    Send { message: ChatMessage },
    /// Everything under `peer` has been seen.
    Read {
        #[serde(alias = "user")]
        peer: UserId,
    },
}

impl Transition for MessageBoxAction {
    const MACHINE: &'static str = "message_box";
    const NAMES: &'static [&'static str] = &["init", "receive", "send", "read"];
}

/// Mapping from peer to the messages exchanged with them, in receipt order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBox {
    conversations: BTreeMap<UserId, Vec<StoredMessage>>,
}

impl MessageBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages exchanged with `peer`, oldest first.
    pub fn messages(&self, peer: &UserId) -> &[StoredMessage] {
        self.conversations.get(peer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn unread_count(&self, peer: &UserId) -> usize {
        self.messages(peer).iter().filter(|m| !m.is_read).count()
    }

    /// Peers with at least one stored message.
    pub fn peers(&self) -> impl Iterator<Item = &UserId> {
        self.conversations.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    fn append(mut self, peer: UserId, message: ChatMessage, is_read: bool) -> Self {
        self.conversations
            .entry(peer)
            .or_default()
            .push(StoredMessage { message, is_read });
        self
    }
}

impl Reducer for MessageBox {
    type Action = MessageBoxAction;

    fn reduce(self, action: MessageBoxAction) -> Self {
        match action {
            MessageBoxAction::Init => MessageBox::default(),
            MessageBoxAction::Receive { message } => {
                let peer = message.sender.clone();
                self.append(peer, message, false)
            }
            MessageBoxAction::Send { message } => {
                let peer = message.receiver.clone();
                self.append(peer, message, true)
            }
            MessageBoxAction::Read { peer } => {
                let mut state = self;
                if let Some(messages) = state.conversations.get_mut(&peer) {
                    messages.iter_mut().for_each(|m| m.is_read = true);
                }
                state
            }
        }
    }
}
