//! HTTP adapters - boundary endpoints served with axum.

pub mod chat;

pub use chat::{chat_router, ChatAppState};
