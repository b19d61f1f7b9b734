//! Application layer - Handlers and client services.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Server handlers back the HTTP boundary; client services consume the
//! stream and keep local state.

pub mod client;
pub mod handlers;

pub use client::{ChatClient, ClientError, DispatchError, Dispatched, EventDispatcher};
pub use handlers::{
    ChannelRouter, OpenStreamCommand, OpenStreamHandler, PresenceRegistry, SendMessageCommand,
    SendMessageHandler,
};
