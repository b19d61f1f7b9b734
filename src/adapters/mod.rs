//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `broker` - Pub/sub and presence set (in-memory, Redis)
//! - `sse` - Server-sent events engine
//! - `http` - Axum boundary endpoints
//! - `client` - Reqwest-based client transport

pub mod broker;
pub mod client;
pub mod http;
pub mod sse;

pub use broker::{InMemoryBroker, InMemoryPresenceStore, RedisBroker, RedisPresenceStore};
pub use client::{HttpChatApi, HttpEventSource};
pub use http::{chat_router, ChatAppState};
pub use sse::{KeepAliveTimer, StreamLifecycle, StreamSettings, StreamWriter};
