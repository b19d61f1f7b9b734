//! Resumption tokens echoed back by clients on reconnect.

use std::fmt;

/// Header a reconnecting client uses to echo the last id it saw.
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Reserved id meaning "you were logged out elsewhere; stop reconnecting".
pub const STOP_RECONNECT_ID: &str = "a2120b03-5892-40c3-90d3-f65392ce7a3e";

/// Opaque last-seen id supplied by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionToken(String);

impl ResumptionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The reserved stop token.
    pub fn stop() -> Self {
        Self(STOP_RECONNECT_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the server must refuse the stream.
    pub fn is_stop(&self) -> bool {
        self.0 == STOP_RECONNECT_ID
    }
}

impl fmt::Display for ResumptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// True when an optional last-seen id is the stop token.
pub fn is_stop_signal(last_event_id: Option<&str>) -> bool {
    last_event_id == Some(STOP_RECONNECT_ID)
}
