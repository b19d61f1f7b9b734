//! Stream frames and their wire encoding.
//!
//! Fields are emitted in a fixed order, one line each, and the frame is
//! terminated by a blank line:
//!
//! ```text
//! retry: <ms>
//! event: <name>
//! data: <payload>
//! :<comment>
//! id: <token>
//!
//! ```

/// Name clients use for unnamed frames.
pub const MESSAGE_EVENT: &str = "message";

/// Named event carrying presence changes.
pub const USER_ATTENDANCE_EVENT: &str = "user_attendance";

/// Padding written by the keep-alive timer.
pub const KEEP_ALIVE_PADDING: &str = ":\n\n";

/// One unit of protocol output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub retry: Option<u64>,
    pub event: Option<String>,
    pub data: Option<String>,
    pub comment: Option<String>,
    pub id: Option<String>,
}

impl Frame {
    /// Unnamed frame; clients see it as a `message` event.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Named event frame.
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Comment-only frame.
    pub fn comment(comment: impl Into<String>) -> Self {
        Self {
            comment: Some(comment.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_retry(mut self, retry_ms: u64) -> Self {
        self.retry = Some(retry_ms);
        self
    }

    /// A frame with no payload, no event and no comment carries nothing a
    /// client would observe and must not be written.
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.event.is_none() && self.comment.is_none()
    }

    /// Serializes the frame, or `None` for an empty frame.
    ///
    /// Multi-line data is split over several `data:` lines so a payload
    /// can never terminate the frame early.
    pub fn encode(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut out = String::with_capacity(self.data.as_ref().map_or(0, |d| d.len()) + 32);

        if let Some(retry) = self.retry {
            out.push_str(&format!("retry: {}\n", retry));
        }
        if let Some(event) = &self.event {
            out.push_str(&format!("event: {}\n", single_line(event)));
        }
        if let Some(data) = &self.data {
            for line in data.split('\n') {
                out.push_str("data: ");
                out.push_str(line.trim_end_matches('\r'));
                out.push('\n');
            }
        }
        if let Some(comment) = &self.comment {
            out.push(':');
            out.push_str(&single_line(comment));
            out.push('\n');
        }
        if let Some(id) = &self.id {
            out.push_str(&format!("id: {}\n", single_line(id)));
        }
        out.push('\n');

        Some(out)
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
