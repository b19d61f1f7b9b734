//! HTTP handlers for chat endpoints.
//!
//! These handlers connect Axum routes to the presence registry and the
//! send/open-stream handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Form, Json, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;

use crate::adapters::sse::StreamSettings;
use crate::application::handlers::{
    ChannelRouter, OpenStreamCommand, OpenStreamError, OpenStreamHandler, PresenceError,
    PresenceRegistry, RouteError, SendMessageCommand, SendMessageError, SendMessageHandler,
};
use crate::domain::foundation::{DomainError, ErrorCode, UserId, ValidationError};
use crate::domain::stream::LAST_EVENT_ID_HEADER;
use crate::ports::{MessageBroker, PresenceStore};

use super::dto::{ErrorResponse, LoginForm, SendForm};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
#[derive(Clone)]
pub struct ChatAppState {
    pub registry: Arc<PresenceRegistry>,
    pub send_handler: Arc<SendMessageHandler>,
    pub open_stream: Arc<OpenStreamHandler>,
}

impl ChatAppState {
    /// Wires the handlers over one broker and presence store.
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        store: Arc<dyn PresenceStore>,
        settings: StreamSettings,
    ) -> Self {
        let registry = Arc::new(PresenceRegistry::new(store, broker.clone()));
        let router = Arc::new(ChannelRouter::new(broker.clone(), registry.clone()));

        Self {
            registry,
            send_handler: Arc::new(SendMessageHandler::new(broker)),
            open_stream: Arc::new(OpenStreamHandler::new(router, settings)),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /login - Mark a user online and return everyone online
///
/// # Errors
///
/// - `400 Bad Request` if the user identifier is empty
/// - `500 Internal Server Error` if the store or broker fails
pub async fn login(
    State(state): State<ChatAppState>,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, ChatApiError> {
    let user = UserId::new(form.user)?;

    let online = state.registry.add(&user).await?;
    let online: Vec<String> = online.into_iter().map(String::from).collect();

    Ok(Json(online))
}

/// POST /send - Publish a message to the receiver's private channel
///
/// # Errors
///
/// - `400 Bad Request` if an identifier is empty or the text is empty or too long
/// - `500 Internal Server Error` if the broker fails
pub async fn send(
    State(state): State<ChatAppState>,
    Form(form): Form<SendForm>,
) -> Result<impl IntoResponse, ChatApiError> {
    let sender = UserId::new(form.sender)?;
    let receiver = UserId::new(form.receiver)?;

    state
        .send_handler
        .handle(SendMessageCommand::new(sender, receiver, form.text))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ════════════════════════════════════════════════════════════════════════════════
// Stream Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /receive/:user - Open the user's event stream
///
/// Answers `204 No Content` when the client resumes with the stop id, which
/// makes a conforming event-stream client give up reconnecting.
///
/// # Errors
///
/// - `400 Bad Request` if the user identifier is empty
/// - `500 Internal Server Error` if the stream cannot be subscribed
pub async fn receive(
    State(state): State<ChatAppState>,
    Path(user): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ChatApiError> {
    let user = UserId::new(user)?;
    let last_event_id = headers
        .get(LAST_EVENT_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    let opened = match state
        .open_stream
        .handle(OpenStreamCommand::new(user, last_event_id))
        .await
    {
        Ok(opened) => opened,
        Err(OpenStreamError::ReconnectRefused) => return Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => return Err(e.into()),
    };

    let body = Body::from_stream(opened.frames.into_stream().map(Ok::<_, Infallible>));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts handler errors to HTTP responses.
#[derive(Debug)]
pub enum ChatApiError {
    BadRequest(DomainError),
    Internal(DomainError),
}

impl From<ValidationError> for ChatApiError {
    fn from(err: ValidationError) -> Self {
        ChatApiError::BadRequest(err.into())
    }
}

impl From<PresenceError> for ChatApiError {
    fn from(err: PresenceError) -> Self {
        let code = match &err {
            PresenceError::Store(_) => ErrorCode::CacheError,
            PresenceError::Broker(_) => ErrorCode::BrokerError,
            PresenceError::Codec(_) => ErrorCode::InternalError,
        };
        ChatApiError::Internal(DomainError::new(code, err.to_string()))
    }
}

impl From<SendMessageError> for ChatApiError {
    fn from(err: SendMessageError) -> Self {
        match err {
            SendMessageError::Validation(e) => e.into(),
            SendMessageError::Codec(e) => {
                ChatApiError::Internal(DomainError::new(ErrorCode::InternalError, e.to_string()))
            }
            SendMessageError::Broker(e) => {
                ChatApiError::Internal(DomainError::new(ErrorCode::BrokerError, e.to_string()))
            }
        }
    }
}

impl From<OpenStreamError> for ChatApiError {
    fn from(err: OpenStreamError) -> Self {
        match err {
            OpenStreamError::ReconnectRefused => ChatApiError::BadRequest(DomainError::new(
                ErrorCode::ReconnectRefused,
                "Reconnection refused",
            )),
            OpenStreamError::Attach(e) => {
                let code = match &e {
                    RouteError::UnknownChannel(_) | RouteError::ForeignChannel(_) => {
                        ErrorCode::ProtocolViolation
                    }
                    RouteError::Stream(_) => ErrorCode::StreamClosed,
                    RouteError::Broker(_) => ErrorCode::BrokerError,
                    RouteError::Encoding(_) | RouteError::Lifecycle(_) => ErrorCode::InternalError,
                };
                ChatApiError::Internal(DomainError::new(code, e.to_string()))
            }
        }
    }
}

impl IntoResponse for ChatApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ChatApiError::BadRequest(err) => (StatusCode::BAD_REQUEST, err),
            ChatApiError::Internal(err) => {
                tracing::error!(error = %err, "Chat request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err)
            }
        };

        (status, Json(ErrorResponse::from(error))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::broker::{InMemoryBroker, InMemoryPresenceStore};
    use crate::domain::chat::Channel;
    use crate::domain::stream::STOP_RECONNECT_ID;
    use crate::ports::BrokerError;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn state() -> (ChatAppState, Arc<InMemoryBroker>, Arc<InMemoryPresenceStore>) {
        let broker = Arc::new(InMemoryBroker::new());
        let store = Arc::new(InMemoryPresenceStore::new());
        let state = ChatAppState::new(broker.clone(), store.clone(), StreamSettings::default());
        (state, broker, store)
    }

    #[tokio::test]
    async fn login_rejects_empty_user() {
        let (state, broker, _) = state();

        let result = login(
            State(state),
            Form(LoginForm {
                user: String::new(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ChatApiError::BadRequest(_))));
        assert_eq!(broker.published_count(), 0);
    }

    #[tokio::test]
    async fn login_marks_user_online() {
        let (state, _, store) = state();

        let result = login(
            State(state),
            Form(LoginForm {
                user: "alice".to_string(),
            }),
        )
        .await;

        assert!(result.is_ok());
        assert!(store.contains(&user("alice")));
    }

    #[tokio::test]
    async fn send_maps_overlong_text_to_validation_error() {
        let (state, broker, _) = state();

        let result = send(
            State(state),
            Form(SendForm {
                sender: "alice".to_string(),
                receiver: "bob".to_string(),
                text: "x".repeat(10_001),
            }),
        )
        .await;

        match result {
            Err(ChatApiError::BadRequest(err)) => {
                assert_eq!(err.code, ErrorCode::ValidationFailed);
                assert_eq!(err.details.get("field"), Some(&"text".to_string()));
            }
            other => panic!("Expected validation failure, got {:?}", other.err()),
        }
        assert!(broker.published_on(&Channel::private(&user("bob"))).is_empty());
    }

    #[tokio::test]
    async fn receive_with_stop_id_answers_no_content() {
        let (state, broker, _) = state();
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::HeaderName::from_bytes(LAST_EVENT_ID_HEADER.as_bytes()).unwrap(),
            STOP_RECONNECT_ID.parse().unwrap(),
        );

        let response = receive(State(state), Path("bob".to_string()), headers)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(broker.subscriber_count(&Channel::Presence), 0);
    }

    #[test]
    fn validation_errors_render_as_bad_request() {
        let response = ChatApiError::from(ValidationError::empty_field("text")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn broker_failures_render_as_server_error() {
        let err = ChatApiError::from(SendMessageError::Broker(BrokerError::Unavailable(
            "connection reset".to_string(),
        )));
        match &err {
            ChatApiError::Internal(e) => assert_eq!(e.code, ErrorCode::BrokerError),
            other => panic!("Expected internal error, got {:?}", other),
        }
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
