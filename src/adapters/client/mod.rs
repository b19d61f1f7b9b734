//! Client transport adapters over HTTP.
//!
//! - `HttpEventSource` - Event-stream consumer with reconnection
//! - `HttpChatApi` - `login` and `send` as form posts

mod chat_api;
mod event_source;

pub use chat_api::HttpChatApi;
pub use event_source::{HttpEventSource, HttpEventStream, DEFAULT_RETRY_DELAY};
