//! Incremental decoder for the frame wire format, used by clients.

use super::frame::MESSAGE_EVENT;

/// A dispatched event as a client observes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// Event name; `message` when the frame had no `event:` line.
    pub event: String,
    pub data: String,
    /// Id carried by this frame, if any.
    pub id: Option<String>,
}

/// Turns a byte stream into [`ServerEvent`]s.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; incomplete lines
/// are buffered until the next chunk. Comment lines are padding and never
/// produce events.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    last_event_id: Option<String>,
    retry: Option<u64>,
    comments: u64,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk, returning every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Most recent id seen on the stream; what a reconnect should echo back.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Most recent reconnection hint in milliseconds.
    pub fn retry(&self) -> Option<u64> {
        self.retry
    }

    /// Number of comment lines (keep-alive padding) consumed so far.
    pub fn comments(&self) -> u64 {
        self.comments
    }

    fn process_line(&mut self, line: &str) -> Option<ServerEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            self.comments += 1;
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // An empty id resets the last event id.
            "id" if !value.contains('\0') => {
                let id = (!value.is_empty()).then(|| value.to_string());
                self.id = id.clone();
                self.last_event_id = id;
            }
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    /// Frames without data lines update the id but dispatch nothing.
    fn dispatch(&mut self) -> Option<ServerEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(ServerEvent {
            event: event.unwrap_or_else(|| MESSAGE_EVENT.to_string()),
            data,
            id,
        })
    }
}
