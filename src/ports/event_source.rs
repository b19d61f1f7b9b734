//! EventSource port - Client-side transport for the event stream.
//!
//! Implementations own connection retry and backoff. They must never reopen
//! a stream whose last seen id is the stop token.

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::stream::ServerEvent;

/// Errors surfaced by a client transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Server returned unexpected status {0}")]
    Status(u16),

    #[error("Stream interrupted: {0}")]
    Interrupted(String),
}

/// One open event stream.
#[async_trait]
pub trait EventStream: Send {
    /// Next decoded event. `None` means the stream ended for good and the
    /// transport will not reconnect.
    async fn next_event(&mut self) -> Option<Result<ServerEvent, TransportError>>;

    /// Closes the stream; further calls to `next_event` return `None`.
    fn close(&mut self);
}

/// Opens event streams for a user.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn connect(
        &self,
        user: &UserId,
        last_event_id: Option<&str>,
    ) -> Result<Box<dyn EventStream>, TransportError>;
}
