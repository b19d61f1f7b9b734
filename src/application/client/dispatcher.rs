//! EventDispatcher - Routes stream events to typed handlers.
//!
//! Holds at most one subscription, owned by the current identity. Changing
//! identity closes the old subscription before the new one is opened, so
//! two streams never feed the same local state.

use std::sync::Arc;

use crate::domain::chat::{ChatPayload, PresenceEvent};
use crate::domain::foundation::UserId;
use crate::domain::stream::{is_stop_signal, ServerEvent, MESSAGE_EVENT, USER_ATTENDANCE_EVENT};
use crate::ports::{EventSource, EventStream, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Unexpected event `{0}` on stream")]
    UnexpectedEvent(String),

    #[error("Malformed `{event}` event: {reason}")]
    Malformed { event: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No open subscription")]
    NotSubscribed,
}

/// Receivers for decoded events.
///
/// Called one at a time, on the task that pumps the dispatcher. Handlers
/// must return promptly.
pub trait StreamHandlers {
    fn on_message(&mut self, payload: ChatPayload);

    fn on_user_attendance(&mut self, event: PresenceEvent);

    fn on_error(&mut self, error: &DispatchError);
}

/// Result of pumping one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Message,
    Attendance,
    /// The server carried the stop id: this session was logged in elsewhere.
    /// The subscription is closed and will not be reopened.
    Superseded,
    /// The stream ended for good.
    Ended,
}

pub struct EventDispatcher {
    source: Arc<dyn EventSource>,
    identity: Option<UserId>,
    stream: Option<Box<dyn EventStream>>,
}

impl EventDispatcher {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            identity: None,
            stream: None,
        }
    }

    pub fn identity(&self) -> Option<&UserId> {
        self.identity.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.stream.is_some()
    }

    /// Switches the session identity.
    ///
    /// Tears down any existing subscription, then opens exactly one for the
    /// new identity when there is one. A failed connect leaves no identity.
    pub async fn set_identity(&mut self, identity: Option<UserId>) -> Result<(), DispatchError> {
        self.teardown();
        self.identity = None;

        if let Some(user) = identity {
            let stream = self.source.connect(&user, None).await?;
            tracing::debug!(user = %user, "Subscription opened");
            self.stream = Some(stream);
            self.identity = Some(user);
        }
        Ok(())
    }

    /// Waits for the next event and hands it to `handlers`.
    pub async fn pump<H: StreamHandlers>(&mut self, handlers: &mut H) -> Result<Dispatched, DispatchError> {
        let stream = self.stream.as_mut().ok_or(DispatchError::NotSubscribed)?;
        let next = stream.next_event().await;

        match next {
            None => {
                self.stream = None;
                tracing::debug!(user = ?self.identity, "Stream ended");
                Ok(Dispatched::Ended)
            }
            Some(Err(e)) => {
                let error = DispatchError::Transport(e);
                handlers.on_error(&error);
                Err(error)
            }
            Some(Ok(event)) => {
                let stop = is_stop_signal(event.id.as_deref());
                let result = Self::dispatch(event, handlers);

                if let Err(error) = &result {
                    handlers.on_error(error);
                }
                if stop {
                    self.teardown();
                    tracing::info!(user = ?self.identity, "Stop id received; not reconnecting");
                    return result.map(|_| Dispatched::Superseded);
                }
                result
            }
        }
    }

    fn dispatch<H: StreamHandlers>(event: ServerEvent, handlers: &mut H) -> Result<Dispatched, DispatchError> {
        match event.event.as_str() {
            MESSAGE_EVENT => {
                let payload: ChatPayload = decode(&event)?;
                handlers.on_message(payload);
                Ok(Dispatched::Message)
            }
            USER_ATTENDANCE_EVENT => {
                let presence: PresenceEvent = decode(&event)?;
                handlers.on_user_attendance(presence);
                Ok(Dispatched::Attendance)
            }
            other => Err(DispatchError::UnexpectedEvent(other.to_string())),
        }
    }

    fn teardown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            tracing::debug!(user = ?self.identity, "Subscription closed");
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &ServerEvent) -> Result<T, DispatchError> {
    serde_json::from_str(&event.data).map_err(|e| DispatchError::Malformed {
        event: event.event.clone(),
        reason: e.to_string(),
    })
}
