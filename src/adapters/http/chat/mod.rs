//! HTTP adapter for the chat boundary.
//!
//! # Endpoints
//!
//! - `POST /login` - Mark a user online
//! - `POST /send` - Publish a message to a user
//! - `GET /receive/:user` - The user's event stream

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{ChatApiError, ChatAppState};
pub use routes::chat_router;
