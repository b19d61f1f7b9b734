//! Integration tests for the HTTP boundary and the reqwest client transport.
//!
//! Each test serves the chat router on an ephemeral local port with the
//! in-memory broker behind it.

use std::sync::Arc;
use std::time::Duration;

use live_chat::adapters::broker::{InMemoryBroker, InMemoryPresenceStore};
use live_chat::adapters::client::{HttpChatApi, HttpEventSource};
use live_chat::adapters::http::{chat_router, ChatAppState};
use live_chat::adapters::sse::StreamSettings;
use live_chat::application::client::{ChatClient, Dispatched};
use live_chat::domain::foundation::UserId;
use live_chat::domain::stream::{LAST_EVENT_ID_HEADER, STOP_RECONNECT_ID};
use live_chat::ports::EventSource;

const WAIT: Duration = Duration::from_secs(5);

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

async fn serve() -> (String, ChatAppState) {
    let state = ChatAppState::new(
        Arc::new(InMemoryBroker::new()),
        Arc::new(InMemoryPresenceStore::new()),
        StreamSettings {
            retry_ms: Some(50),
            ..StreamSettings::default()
        },
    );
    let app = chat_router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn client(base: &str) -> ChatClient {
    let api = Arc::new(HttpChatApi::new(base, Duration::from_secs(5)).unwrap());
    let source = Arc::new(HttpEventSource::new(base).with_retry_delay(Duration::from_millis(50)));
    ChatClient::new(api, source)
}

async fn pump(client: &mut ChatClient) -> Dispatched {
    tokio::time::timeout(WAIT, client.pump())
        .await
        .expect("no event within timeout")
        .expect("pump failed")
}

#[tokio::test]
async fn chat_round_trip_over_http() {
    let (base, _) = serve().await;

    let mut bob = client(&base);
    bob.login(user("bob")).await.unwrap();
    assert_eq!(pump(&mut bob).await, Dispatched::Attendance);

    let mut alice = client(&base);
    alice.login(user("alice")).await.unwrap();
    assert_eq!(pump(&mut alice).await, Dispatched::Attendance);
    assert_eq!(alice.peers(), vec![user("bob")]);

    assert_eq!(pump(&mut bob).await, Dispatched::Attendance);
    assert!(bob.is_online(&user("alice")));

    alice.send(user("bob"), "hi").await.unwrap();
    assert_eq!(pump(&mut bob).await, Dispatched::Message);
    assert_eq!(bob.messages(&user("alice"))[0].message.text, "hi");
    assert_eq!(bob.unread_count(&user("alice")), 1);
}

#[tokio::test]
async fn forced_removal_over_http_stops_the_session() {
    let (base, state) = serve().await;

    let mut bob = client(&base);
    bob.login(user("bob")).await.unwrap();
    assert_eq!(pump(&mut bob).await, Dispatched::Attendance);

    state.registry.remove(&user("bob")).await.unwrap();

    assert_eq!(pump(&mut bob).await, Dispatched::Superseded);
    assert!(!bob.is_logged_in());
}

#[tokio::test]
async fn stream_endpoint_refuses_stop_id() {
    let (base, _) = serve().await;

    let response = reqwest::Client::new()
        .get(format!("{}/receive/bob", base))
        .header(LAST_EVENT_ID_HEADER, STOP_RECONNECT_ID)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 204);
}

#[tokio::test]
async fn stream_endpoint_sends_retry_hint_first() {
    let (base, _) = serve().await;

    let mut response = reqwest::Client::new()
        .get(format!("{}/receive/bob", base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let chunk = tokio::time::timeout(WAIT, response.chunk())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(String::from_utf8_lossy(&chunk).starts_with("retry: 50\n"));
}

#[tokio::test]
async fn send_with_empty_text_is_rejected() {
    let (base, _) = serve().await;

    let response = reqwest::Client::new()
        .post(format!("{}/send", base))
        .form(&[("sender", "alice"), ("receiver", "bob"), ("text", "")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn event_source_resuming_from_stop_id_never_connects() {
    let (base, _) = serve().await;
    let source = HttpEventSource::new(&base);

    let mut stream = source
        .connect(&user("bob"), Some(STOP_RECONNECT_ID))
        .await
        .unwrap();

    assert!(stream.next_event().await.is_none());
}
