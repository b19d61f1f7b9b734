//! ChatClient - One user's client session.
//!
//! Owns the event dispatcher and both local state containers. State only
//! changes through reducer actions, from user calls or from pumped events.

use std::mem;
use std::sync::Arc;

use crate::domain::chat::{ChatMessage, ChatPayload, PresenceAction, PresenceEvent};
use crate::domain::client::{MessageBox, MessageBoxAction, OnlineAction, OnlineSet, StoredMessage};
use crate::domain::foundation::{Reducer, UserId, ValidationError};
use crate::ports::{ChatApi, EventSource, TransportError};

use super::dispatcher::{DispatchError, Dispatched, EventDispatcher, StreamHandlers};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Invalid message: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Local state fed by the dispatcher.
#[derive(Debug, Default)]
struct SessionState {
    me: Option<UserId>,
    messages: MessageBox,
    online: OnlineSet,
    last_error: Option<String>,
}

impl SessionState {
    fn apply_messages(&mut self, action: MessageBoxAction) {
        self.messages = mem::take(&mut self.messages).reduce(action);
    }

    fn apply_online(&mut self, action: OnlineAction) {
        self.online = mem::take(&mut self.online).reduce(action);
    }

    fn reset(&mut self) {
        if let Some(me) = self.me.take() {
            self.apply_online(OnlineAction::Remove { user: me });
        }
        self.apply_online(OnlineAction::Set { users: Vec::new() });
        self.apply_messages(MessageBoxAction::Init);
    }
}

impl StreamHandlers for SessionState {
    fn on_message(&mut self, payload: ChatPayload) {
        let Some(me) = self.me.clone() else {
            tracing::warn!(sender = %payload.sender, "Message received while logged out; dropped");
            return;
        };
        self.apply_messages(MessageBoxAction::Receive {
            message: payload.into_message(me),
        });
    }

    fn on_user_attendance(&mut self, event: PresenceEvent) {
        let action = match event.action {
            PresenceAction::Add => OnlineAction::Add { user: event.user },
            PresenceAction::Remove => OnlineAction::Remove { user: event.user },
        };
        self.apply_online(action);
    }

    fn on_error(&mut self, error: &DispatchError) {
        tracing::error!(user = ?self.me, error = %error, "Stream event rejected");
        self.last_error = Some(error.to_string());
    }
}

/// A chat client session.
///
/// # Example
///
/// ```ignore
/// let mut client = ChatClient::new(api, source);
/// client.login(alice).await?;
/// client.send(bob.clone(), "hi").await?;
/// while client.pump().await? != Dispatched::Ended { /* render */ }
/// ```
pub struct ChatClient {
    api: Arc<dyn ChatApi>,
    dispatcher: EventDispatcher,
    state: SessionState,
}

impl ChatClient {
    pub fn new(api: Arc<dyn ChatApi>, source: Arc<dyn EventSource>) -> Self {
        Self {
            api,
            dispatcher: EventDispatcher::new(source),
            state: SessionState::default(),
        }
    }

    /// Logs in as `user`, replacing any current session.
    ///
    /// The stream is opened before announcing, so the session sees its own
    /// arrival and everything after it.
    pub async fn login(&mut self, user: UserId) -> Result<(), ClientError> {
        if self.state.me.is_some() {
            self.logout().await?;
        }

        self.dispatcher.set_identity(Some(user.clone())).await?;
        self.state.me = Some(user.clone());

        let users = match self.api.login(&user).await {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "Login rejected; session rolled back");
                self.state.reset();
                self.dispatcher.set_identity(None).await?;
                return Err(e.into());
            }
        };
        self.state.apply_online(OnlineAction::Set { users });

        tracing::info!(user = %user, online = self.state.online.len(), "Logged in");
        Ok(())
    }

    /// Ends the session and clears local state.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let user = self.state.me.clone();
        self.state.reset();
        self.dispatcher.set_identity(None).await?;
        tracing::info!(user = ?user, "Logged out");
        Ok(())
    }

    /// Sends a message, echoing it locally once the server accepted it.
    pub async fn send(&mut self, to: UserId, text: impl Into<String>) -> Result<ChatMessage, ClientError> {
        let me = self.state.me.clone().ok_or(ClientError::NotLoggedIn)?;
        let message = ChatMessage::new(me, to, text)?;

        self.api.send(&message).await?;
        self.state.apply_messages(MessageBoxAction::Send {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Marks everything from `peer` as read.
    pub fn read(&mut self, peer: &UserId) {
        self.state.apply_messages(MessageBoxAction::Read { peer: peer.clone() });
    }

    /// Processes one inbound event.
    ///
    /// A stop id logs the session out locally; the stream is not reopened.
    pub async fn pump(&mut self) -> Result<Dispatched, ClientError> {
        let dispatched = self.dispatcher.pump(&mut self.state).await?;

        if dispatched == Dispatched::Superseded {
            tracing::warn!(user = ?self.state.me, "Logged in elsewhere; session ended");
            self.state.reset();
            self.dispatcher.set_identity(None).await?;
        }
        Ok(dispatched)
    }

    pub fn identity(&self) -> Option<&UserId> {
        self.state.me.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.me.is_some()
    }

    /// True while the event stream for the current identity is open.
    pub fn is_subscribed(&self) -> bool {
        self.dispatcher.is_subscribed()
    }

    /// Online users other than the local user.
    pub fn peers(&self) -> Vec<UserId> {
        match &self.state.me {
            Some(me) => self.state.online.peers(me).cloned().collect(),
            None => self.state.online.users().to_vec(),
        }
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.state.online.contains(user)
    }

    pub fn messages(&self, peer: &UserId) -> &[StoredMessage] {
        self.state.messages.messages(peer)
    }

    pub fn unread_count(&self, peer: &UserId) -> usize {
        self.state.messages.unread_count(peer)
    }

    pub fn message_box(&self) -> &MessageBox {
        &self.state.messages
    }

    pub fn online(&self) -> &OnlineSet {
        &self.state.online
    }

    /// Last error reported by the stream, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }
}
