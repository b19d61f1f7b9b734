//! End-to-end chat flows over the in-memory broker.
//!
//! Clients talk to the server handlers through an in-process transport that
//! feeds the encoded frames back through the client-side frame parser, so
//! every byte a browser would see is exercised.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use live_chat::adapters::broker::{InMemoryBroker, InMemoryPresenceStore};
use live_chat::adapters::http::ChatAppState;
use live_chat::adapters::sse::{FrameReceiver, StreamSettings};
use live_chat::application::client::{ChatClient, Dispatched};
use live_chat::application::handlers::{OpenStreamCommand, OpenStreamError, SendMessageCommand};
use live_chat::domain::chat::{Channel, ChatMessage};
use live_chat::domain::foundation::UserId;
use live_chat::domain::stream::{FrameParser, ServerEvent, STOP_RECONNECT_ID};
use live_chat::ports::{ChatApi, EventSource, EventStream, TransportError};

// =============================================================================
// Test Infrastructure
// =============================================================================

const WAIT: Duration = Duration::from_secs(2);

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

struct Server {
    state: ChatAppState,
    broker: Arc<InMemoryBroker>,
    store: Arc<InMemoryPresenceStore>,
}

impl Server {
    fn new() -> Self {
        let broker = Arc::new(InMemoryBroker::new());
        let store = Arc::new(InMemoryPresenceStore::new());
        let state = ChatAppState::new(broker.clone(), store.clone(), StreamSettings::default());
        Self {
            state,
            broker,
            store,
        }
    }

    fn client(&self) -> (ChatClient, Arc<LoopbackSource>) {
        let source = Arc::new(LoopbackSource {
            state: self.state.clone(),
            connects: Mutex::new(Vec::new()),
        });
        let api = Arc::new(LoopbackApi {
            state: self.state.clone(),
        });
        (ChatClient::new(api, source.clone()), source)
    }
}

struct LoopbackApi {
    state: ChatAppState,
}

#[async_trait]
impl ChatApi for LoopbackApi {
    async fn login(&self, user: &UserId) -> Result<Vec<UserId>, TransportError> {
        self.state
            .registry
            .add(user)
            .await
            .map_err(|e| TransportError::Interrupted(e.to_string()))
    }

    async fn send(&self, message: &ChatMessage) -> Result<(), TransportError> {
        self.state
            .send_handler
            .handle(SendMessageCommand::new(
                message.sender.clone(),
                message.receiver.clone(),
                message.text.clone(),
            ))
            .await
            .map(|_| ())
            .map_err(|_| TransportError::Status(400))
    }
}

struct LoopbackSource {
    state: ChatAppState,
    connects: Mutex<Vec<(UserId, Option<String>)>>,
}

impl LoopbackSource {
    fn connects(&self) -> Vec<(UserId, Option<String>)> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for LoopbackSource {
    async fn connect(
        &self,
        user: &UserId,
        last_event_id: Option<&str>,
    ) -> Result<Box<dyn EventStream>, TransportError> {
        self.connects
            .lock()
            .unwrap()
            .push((user.clone(), last_event_id.map(str::to_string)));

        match self
            .state
            .open_stream
            .handle(OpenStreamCommand::new(user.clone(), last_event_id))
            .await
        {
            Ok(opened) => Ok(Box::new(LoopbackStream::new(Some(opened.frames)))),
            Err(OpenStreamError::ReconnectRefused) => Ok(Box::new(LoopbackStream::new(None))),
            Err(e) => Err(TransportError::Connect(e.to_string())),
        }
    }
}

struct LoopbackStream {
    frames: Option<FrameReceiver>,
    parser: FrameParser,
    pending: VecDeque<ServerEvent>,
}

impl LoopbackStream {
    fn new(frames: Option<FrameReceiver>) -> Self {
        Self {
            frames,
            parser: FrameParser::new(),
            pending: VecDeque::new(),
        }
    }
}

#[async_trait]
impl EventStream for LoopbackStream {
    async fn next_event(&mut self) -> Option<Result<ServerEvent, TransportError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            let frames = self.frames.as_mut()?;
            match frames.recv().await {
                Some(text) => {
                    let events = self.parser.feed(text.as_bytes());
                    self.pending.extend(events);
                }
                None => {
                    self.frames = None;
                    return None;
                }
            }
        }
    }

    fn close(&mut self) {
        self.frames = None;
        self.pending.clear();
    }
}

async fn pump(client: &mut ChatClient) -> Dispatched {
    tokio::time::timeout(WAIT, client.pump())
        .await
        .expect("no event within timeout")
        .expect("pump failed")
}

async fn logged_in(server: &Server, id: &str) -> (ChatClient, Arc<LoopbackSource>) {
    let (mut client, source) = server.client();
    client.login(user(id)).await.unwrap();
    // Own arrival announcement.
    assert_eq!(pump(&mut client).await, Dispatched::Attendance);
    (client, source)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn login_announces_arrival_to_open_streams() {
    let server = Server::new();
    let mut observer = server
        .state
        .open_stream
        .handle(OpenStreamCommand::new(user("carol"), None))
        .await
        .unwrap();

    let (alice, _) = logged_in(&server, "alice").await;

    let frame = tokio::time::timeout(WAIT, observer.frames.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        frame,
        "event: user_attendance\ndata: {\"user\":\"alice\",\"action\":\"add\"}\n\n"
    );
    assert!(server.store.contains(&user("alice")));
    assert!(alice.is_online(&user("alice")));
}

#[tokio::test]
async fn login_returns_everyone_already_online() {
    let server = Server::new();
    let (mut bob, _) = logged_in(&server, "bob").await;
    let (alice, _) = logged_in(&server, "alice").await;

    assert_eq!(alice.peers(), vec![user("bob")]);

    assert_eq!(pump(&mut bob).await, Dispatched::Attendance);
    assert!(bob.is_online(&user("alice")));
}

#[tokio::test]
async fn sent_message_reaches_receiver_and_echoes_locally() {
    let server = Server::new();
    let (mut bob, _) = logged_in(&server, "bob").await;
    let (mut alice, _) = logged_in(&server, "alice").await;
    assert_eq!(pump(&mut bob).await, Dispatched::Attendance);

    alice.send(user("bob"), "hi").await.unwrap();

    let echoed = alice.messages(&user("bob"));
    assert_eq!(echoed.len(), 1);
    assert_eq!(echoed[0].message.text, "hi");
    assert!(echoed[0].is_read);

    assert_eq!(pump(&mut bob).await, Dispatched::Message);
    let received = bob.messages(&user("alice"));
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].message.sender, user("alice"));
    assert_eq!(received[0].message.receiver, user("bob"));
    assert!(!received[0].is_read);
    assert_eq!(bob.unread_count(&user("alice")), 1);

    bob.read(&user("alice"));
    assert_eq!(bob.unread_count(&user("alice")), 0);
}

#[tokio::test]
async fn disconnect_removes_user_from_other_clients() {
    let server = Server::new();
    let (mut bob, _) = logged_in(&server, "bob").await;
    let (alice, _) = logged_in(&server, "alice").await;
    assert_eq!(pump(&mut bob).await, Dispatched::Attendance);
    assert!(bob.is_online(&user("alice")));

    // Transport closes without a logout.
    drop(alice);

    assert_eq!(pump(&mut bob).await, Dispatched::Attendance);
    assert!(!bob.is_online(&user("alice")));
    assert!(!server.store.contains(&user("alice")));

    let presence = server.broker.published_on(&Channel::Presence);
    let last = presence.last().unwrap();
    assert!(last.payload.contains("remove"));
    assert!(last.payload.contains("alice"));
}

#[tokio::test]
async fn logout_clears_local_state_and_announces_departure() {
    let server = Server::new();
    let (mut bob, _) = logged_in(&server, "bob").await;
    let (mut alice, _) = logged_in(&server, "alice").await;
    assert_eq!(pump(&mut bob).await, Dispatched::Attendance);
    alice.send(user("bob"), "bye").await.unwrap();

    alice.logout().await.unwrap();

    assert!(!alice.is_logged_in());
    assert!(alice.message_box().is_empty());
    assert!(alice.online().is_empty());

    assert_eq!(pump(&mut bob).await, Dispatched::Message);
    assert_eq!(pump(&mut bob).await, Dispatched::Attendance);
    assert!(!bob.is_online(&user("alice")));
}

#[tokio::test]
async fn forced_removal_ends_session_without_reconnecting() {
    let server = Server::new();
    let (mut bob, source) = logged_in(&server, "bob").await;

    // Removed elsewhere, e.g. a duplicate login.
    server.state.registry.remove(&user("bob")).await.unwrap();

    assert_eq!(pump(&mut bob).await, Dispatched::Superseded);
    assert!(!bob.is_logged_in());
    assert!(bob.online().is_empty());

    let connects = source.connects();
    assert_eq!(connects, vec![(user("bob"), None)]);
    assert!(connects
        .iter()
        .all(|(_, id)| id.as_deref() != Some(STOP_RECONNECT_ID)));
}

#[tokio::test]
async fn resuming_with_stop_id_is_refused() {
    let server = Server::new();

    let result = server
        .state
        .open_stream
        .handle(OpenStreamCommand::new(user("bob"), Some(STOP_RECONNECT_ID)))
        .await;

    assert!(matches!(result, Err(OpenStreamError::ReconnectRefused)));
    assert_eq!(server.broker.subscriber_count(&Channel::Presence), 0);
}
