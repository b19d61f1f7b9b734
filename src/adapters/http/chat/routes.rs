//! Route configuration for chat endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{login, receive, send, ChatAppState};

/// Creates the chat router with all endpoints.
///
/// Routes:
/// - `POST /login` - Mark a user online, returns the online list
/// - `POST /send` - Publish a chat message
/// - `GET /receive/:user` - Open the user's event stream
pub fn chat_router() -> Router<ChatAppState> {
    Router::new()
        .route("/login", post(login))
        .route("/send", post(send))
        .route("/receive/:user", get(receive))
}
